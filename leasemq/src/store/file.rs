//! Durable store keeping one file per message in a directory. The file name is the decimal id of
//! the message, the content is the raw payload.
//!
//! A record is first written to `<id>.tmp`, synced, then renamed to `<id>` and the directory is
//! synced as well. So a file with a plain numeric name is always a complete record, and leftover
//! temp files are pushes which never returned an id.
//!
//! Ids must not be reused after a restart even if the newest messages were deleted. Before the
//! record of the highest committed id is removed, that id is saved in the `last-id` file.
use super::{Recovered, Store};
use crate::error::ErrorKind;
use crate::message::MessageId;
use crate::{Error, Result};
use bytes::Bytes;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const TMP_SUFFIX: &str = ".tmp";
const LAST_ID_FILE: &str = "last-id";

#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    /// The highest id committed so far.
    last_id: Option<MessageId>,
    /// The id saved in the `last-id` file.
    saved_last_id: Option<MessageId>,
}

impl FileStore {
    /// Open the store in `dir`, creating the directory if it doesn't exist.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();

        fs::create_dir_all(&dir).await.map_err(|e| io_error(&dir, e))?;

        Ok(FileStore {
            dir,
            last_id: None,
            saved_last_id: None,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: MessageId) -> PathBuf {
        self.dir.join(id.to_string())
    }

    fn tmp_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}{TMP_SUFFIX}"))
    }

    /// Write a file via a synced temp file and a rename, so the file is either complete or missing.
    async fn commit_file(&self, name: &str, content: &[u8]) -> Result<()> {
        let tmp = self.tmp_path(name);

        if let Err(e) = write_synced(&tmp, content).await {
            let _ = fs::remove_file(&tmp).await;

            return Err(io_error(&tmp, e));
        }

        let path = self.dir.join(name);

        fs::rename(&tmp, &path).await.map_err(|e| io_error(&path, e))?;
        fsync_dir(&self.dir).await
    }

    async fn read_last_id(&self) -> Result<Option<MessageId>> {
        let path = self.dir.join(LAST_ID_FILE);

        match fs::read_to_string(&path).await {
            Ok(content) => match content.trim().parse::<MessageId>() {
                Ok(id) => Ok(Some(id)),
                Err(e) => {
                    Err(Box::new(ErrorKind::Storage.into_error(&format!("{}: {e}", path.display()))))
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}

impl Store for FileStore {
    async fn recover(&mut self) -> Result<Recovered> {
        let mut entries = fs::read_dir(&self.dir).await.map_err(|e| io_error(&self.dir, e))?;
        let mut ids = vec![];

        while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(&self.dir, e))? {
            let path = entry.path();

            if !entry.file_type().await.map_err(|e| io_error(&path, e))?.is_file() {
                continue;
            }

            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };

            if name.ends_with(TMP_SUFFIX) {
                warn!("Removing uncommitted file {}", path.display());

                fs::remove_file(&path).await.map_err(|e| io_error(&path, e))?;
                continue;
            }

            match parse_record_name(name) {
                Some(id) => ids.push(id),
                None if name == LAST_ID_FILE => (),
                None => debug!("Skipping foreign file {}", path.display()),
            }
        }

        ids.sort_unstable();

        self.saved_last_id = self.read_last_id().await?;
        self.last_id = ids.last().copied().max(self.saved_last_id);

        info!(
            "Recovered {} messages from {}, last id is {:?}",
            ids.len(),
            self.dir.display(),
            self.last_id
        );

        Ok(Recovered {
            ids,
            last_id: self.last_id,
        })
    }

    async fn write(&mut self, id: MessageId, payload: Bytes) -> Result<()> {
        self.commit_file(&id.to_string(), &payload).await?;

        self.last_id = self.last_id.max(Some(id));

        Ok(())
    }

    async fn read(&mut self, id: MessageId) -> Result<Bytes> {
        let path = self.record_path(id);

        match fs::read(&path).await {
            Ok(content) => Ok(Bytes::from(content)),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    async fn remove(&mut self, id: MessageId) -> Result<()> {
        // Saving the highest id instead of this one, the consecutive deletes can skip this step.
        if self.saved_last_id < Some(id) {
            let last_id = self.last_id.max(Some(id));

            if let Some(last_id) = last_id {
                self.commit_file(LAST_ID_FILE, last_id.to_string().as_bytes()).await?;
                self.saved_last_id = Some(last_id);
            }
        }

        let path = self.record_path(id);

        fs::remove_file(&path).await.map_err(|e| io_error(&path, e))?;
        fsync_dir(&self.dir).await
    }
}

async fn write_synced(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;

    file.write_all(content).await?;
    file.flush().await?;
    file.sync_all().await
}

/// Only the canonical decimal form is a record name, so `007` or `+7` are not mistaken for the
/// record of message 7.
fn parse_record_name(name: &str) -> Option<MessageId> {
    let id = name.parse::<MessageId>().ok()?;

    (id.to_string() == name).then_some(id)
}

/// Renames and removals are durable only after the directory entry itself is synced.
async fn fsync_dir(dir: &Path) -> Result<()> {
    let handle = fs::File::open(dir).await.map_err(|e| io_error(dir, e))?;

    handle.sync_all().await.map_err(|e| io_error(dir, e))
}

fn io_error(path: &Path, err: std::io::Error) -> Error {
    Box::new(ErrorKind::Storage.into_error(&format!("{}: {err}", path.display())))
}
