//! Consumer sessions. A consumer identity is handed out by the queue service when a session is
//! opened, and every lease records the identity which pulled the message. Only the owner can
//! delete the message of a lease.
use crate::message::Delivery;
use crate::queue::QueueService;
use crate::Result;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConsumerId(Uuid);

impl ConsumerId {
    pub(crate) fn new() -> Self {
        ConsumerId(Uuid::new_v4())
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque name of one lease. It is returned by the pull together with the payload and is needed to
/// delete the message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LeaseToken(Uuid);

impl LeaseToken {
    pub(crate) fn new() -> Self {
        LeaseToken(Uuid::new_v4())
    }
}

impl fmt::Display for LeaseToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A consumer session on a queue.
///
/// A consumer can hold any number of leases at the same time, every pull gives a new lease with
/// its own token.
#[derive(Clone)]
pub struct Consumer {
    id: ConsumerId,
    service: QueueService,
}

impl Consumer {
    pub(crate) fn new(service: QueueService) -> Self {
        Consumer {
            id: ConsumerId::new(),
            service,
        }
    }

    pub fn id(&self) -> ConsumerId {
        self.id
    }

    /// Wait until there is a visible message and take the one with the lowest id.
    ///
    /// The message stays invisible until the visibility timeout elapses or the message is deleted.
    /// Dropping the returned future abandons the wait without losing any message. It fails only
    /// when the queue service is shut down.
    pub async fn pull(&self) -> Result<Delivery> {
        self.service.pull(self.id).await
    }

    /// Pull with a limit on the waiting. `None` means no message became visible in time.
    pub async fn pull_timeout(&self, timeout: Duration) -> Result<Option<Delivery>> {
        let sleep = tokio::time::sleep(timeout);
        tokio::pin!(sleep);

        tokio::select! {
            delivery = self.pull() => {
                delivery.map(Some)
            }
            _ = &mut sleep => {
                Ok(None)
            }
        }
    }

    /// Acknowledge a pulled message, removing it from the queue for good.
    ///
    /// Returns `false` if the lease has already expired (the message is visible again), was
    /// already deleted, or is not held by this consumer.
    pub async fn delete(&self, token: LeaseToken) -> bool {
        self.service.delete(self.id, token).await
    }
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer").field("id", &self.id).finish()
    }
}
