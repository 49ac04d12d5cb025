use super::{Recovered, Store};
use crate::error::storage_error;
use crate::message::MessageId;
use crate::Result;
use bytes::Bytes;
use std::collections::HashMap;

/// Keeps the payloads in a map, nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: HashMap<MessageId, Bytes>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    async fn recover(&mut self) -> Result<Recovered> {
        let mut ids: Vec<MessageId> = self.records.keys().copied().collect();
        ids.sort_unstable();

        Ok(Recovered {
            last_id: ids.last().copied(),
            ids,
        })
    }

    async fn write(&mut self, id: MessageId, payload: Bytes) -> Result<()> {
        self.records.insert(id, payload);

        Ok(())
    }

    async fn read(&mut self, id: MessageId) -> Result<Bytes> {
        match self.records.get(&id) {
            Some(payload) => Ok(payload.clone()),
            None => storage_error(&format!("message {id} is not stored")),
        }
    }

    async fn remove(&mut self, id: MessageId) -> Result<()> {
        self.records.remove(&id);

        Ok(())
    }
}
