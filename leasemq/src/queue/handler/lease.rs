use crate::consumer::ConsumerId;
use crate::message::MessageId;
use tokio::time::Instant;

/// The claim on a pulled message until its deadline. A lease is active as long as it is in the
/// lease map, a delete or the expiry removes it.
#[derive(Debug)]
pub(crate) struct Lease {
    pub(crate) message_id: MessageId,
    /// `None` if the payload couldn't be read, the message is held back until the deadline and
    /// then it is tried again.
    pub(crate) owner: Option<ConsumerId>,
    pub(crate) deadline: Instant,
}

impl Lease {
    pub(crate) fn new(message_id: MessageId, owner: ConsumerId, deadline: Instant) -> Self {
        Lease {
            message_id,
            owner: Some(owner),
            deadline,
        }
    }

    pub(crate) fn retry(message_id: MessageId, deadline: Instant) -> Self {
        Lease {
            message_id,
            owner: None,
            deadline,
        }
    }

    pub(crate) fn is_held_by(&self, consumer: ConsumerId) -> bool {
        self.owner == Some(consumer)
    }
}
