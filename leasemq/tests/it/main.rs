mod file_based;
mod helper;
mod in_memory;
