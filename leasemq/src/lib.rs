//! Single node message queue with at-least-once delivery.
//!
//! Producers [`QueueService::push`] payloads, consumers open a [`Consumer`] session and
//! [`Consumer::pull`] messages. A pulled message becomes invisible for the visibility timeout; the
//! consumer acknowledges it with [`Consumer::delete`]. If the lease expires before the delete, the
//! message becomes visible again with its original id and is delivered once more.
//!
//! Two storage variants are provided: [`MemoryStore`] and the durable [`FileStore`].
pub mod consumer;
mod dev;
pub mod error;
pub mod message;
pub mod queue;
pub mod store;

pub use consumer::{Consumer, ConsumerId, LeaseToken};
pub use dev::setup_logger;
pub use error::{Error, ErrorKind, QueueError, Result};
pub use message::{Delivery, MessageId};
pub use queue::{QueueConfig, QueueService, QueueStats};
pub use store::{file::FileStore, memory::MemoryStore, Store};

/// Log the error of a result and pass the result through unchanged.
#[macro_export]
macro_rules! chk {
    ($val:expr) => {
        match $val {
            ok @ Ok(_) => ok,
            Err(e) => {
                log::error!("Error {:?}", e);

                Err(e)
            }
        }
    };
}

/// Log the error of a result which is otherwise dropped.
#[macro_export]
macro_rules! logerr {
    ($val:expr) => {
        if let Err(e) = $val {
            log::error!("Error {:?}", e);
        }
    };
}
