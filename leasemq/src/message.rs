//! Messages are identified by the sequence id they got at push time. The id defines the delivery
//! order, a redelivered message keeps its id.
use crate::consumer::LeaseToken;
use crate::error::storage_error;
use crate::Result;
use bytes::Bytes;
use std::fmt;

pub type MessageId = u64;

/// A message handed out by a pull, together with the token of the lease the consumer holds on it.
#[derive(Clone)]
pub struct Delivery {
    pub id: MessageId,
    pub payload: Bytes,
    pub token: LeaseToken,
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = String::from_utf8_lossy(&self.payload[..std::cmp::min(64usize, self.payload.len())]);

        f.debug_struct("Delivery")
            .field("id", &self.id)
            .field("token", &self.token)
            .field("body", &body.to_string())
            .finish()
    }
}

/// Hands out ids in push order. Ids start from 1 and are never reused, not even when the push
/// failed after the id was allocated.
#[derive(Debug)]
pub(crate) struct IdGenerator {
    next: MessageId,
}

impl IdGenerator {
    /// Continue after the highest id found in the store, or start from 1.
    pub(crate) fn after(max_id: Option<MessageId>) -> Result<Self> {
        let next = match max_id {
            None => 1,
            Some(id) => match id.checked_add(1) {
                Some(next) => next,
                None => return storage_error(&format!("stored id {id} leaves no id for new messages")),
            },
        };

        Ok(IdGenerator { next })
    }

    pub(crate) fn next_id(&mut self) -> Result<MessageId> {
        let id = self.next;

        match id.checked_add(1) {
            Some(next) => self.next = next,
            None => return storage_error("message ids are exhausted"),
        }

        Ok(id)
    }

    pub(crate) fn peek(&self) -> MessageId {
        self.next
    }
}
