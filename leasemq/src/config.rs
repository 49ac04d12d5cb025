use anyhow::Result;
use clap::{Parser, Subcommand};
use leasemq::QueueConfig;
use serde_derive::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "leasemq", version, author, about = "Push, drain and inspect a leasemq queue")]
pub(crate) struct Cli {
    /// Path to the config file
    #[arg(short, long, value_name = "FILE")]
    pub(crate) config: Option<PathBuf>,
    /// Use a file store in this directory, whatever the config says
    #[arg(short, long, value_name = "DIR")]
    pub(crate) data_dir: Option<PathBuf>,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Push the payloads as separate messages
    Push { payloads: Vec<String> },
    /// Pull and delete visible messages, printing them
    Drain {
        /// Stop after this many messages
        #[arg(long)]
        max: Option<usize>,
        /// Stop when no message arrives for this long
        #[arg(long, value_name = "MILLIS", default_value_t = 100)]
        idle_ms: u64,
        /// Keep waiting for messages until Ctrl-C
        #[arg(long)]
        follow: bool,
    },
    /// Print the queue counters as JSON
    Stats,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Config {
    pub(crate) queue: Queue,
    pub(crate) storage: Storage,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub(crate) struct Queue {
    pub(crate) visibility_timeout_ms: u64,
}

impl Default for Queue {
    fn default() -> Self {
        Queue {
            visibility_timeout_ms: leasemq::queue::DEFAULT_VISIBILITY_TIMEOUT.as_millis() as u64,
        }
    }
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub(crate) enum Storage {
    Memory,
    File { path: PathBuf },
}

impl Default for Storage {
    fn default() -> Self {
        Storage::File {
            path: PathBuf::from("leasemq-data"),
        }
    }
}

impl Config {
    pub(crate) fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            visibility_timeout: Duration::from_millis(self.queue.visibility_timeout_ms),
        }
    }
}

pub(crate) fn parse_config(path: &Path) -> Result<Config> {
    let cfg = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&cfg)?)
}
