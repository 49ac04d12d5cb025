pub mod file;
pub mod memory;

use crate::message::MessageId;
use crate::Result;
use bytes::Bytes;
use std::future::Future;

/// What a store found at startup.
#[derive(Debug, Default, PartialEq)]
pub struct Recovered {
    /// Ids of the committed records in ascending order.
    pub ids: Vec<MessageId>,
    /// The highest id the store has ever committed, even if its record is deleted since.
    pub last_id: Option<MessageId>,
}

/// Storage of the message payloads by id.
///
/// The queue handler owns the store and calls it from its own task, so implementations don't need
/// any locking. A record exists from a successful `write` until the `remove` of the same id.
pub trait Store: Send + 'static {
    /// Enumerate the committed records. Called once, before the queue starts serving.
    fn recover(&mut self) -> impl Future<Output = Result<Recovered>> + Send;

    /// Commit the payload of a new message. When it returns `Ok` the record must survive whatever
    /// the store promises to survive.
    fn write(&mut self, id: MessageId, payload: Bytes) -> impl Future<Output = Result<()>> + Send;

    fn read(&mut self, id: MessageId) -> impl Future<Output = Result<Bytes>> + Send;

    fn remove(&mut self, id: MessageId) -> impl Future<Output = Result<()>> + Send;
}
