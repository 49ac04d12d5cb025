pub(crate) mod handler;

use crate::consumer::{Consumer, ConsumerId, LeaseToken};
use crate::error::closed_error;
use crate::message::{Delivery, MessageId};
use crate::store::{file::FileStore, memory::MemoryStore, Store};
use crate::{chk, Result};
use bytes::Bytes;
use handler::{QueueCommand, QueueCommandSink};
use log::info;
use serde_derive::Serialize;
use std::path::Path;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Visibility timeout of the leases if it is not configured otherwise.
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_millis(1000);

const COMMAND_BUFFER: usize = 64;

#[derive(Clone, Debug)]
pub struct QueueConfig {
    /// How long a pulled message stays invisible waiting for its delete.
    pub visibility_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
        }
    }
}

/// Snapshot of the queue counters.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct QueueStats {
    /// Messages which can be pulled right now.
    pub visible: usize,
    /// Messages leased by consumers, or held back for a visibility timeout after a failed read.
    pub in_flight: usize,
    /// Consumers blocked in pull.
    pub waiting_consumers: usize,
    /// The id the next push will get.
    pub next_id: MessageId,
    pub pushed: u64,
    pub released: u64,
    pub expired: u64,
    /// Failed payload reads. The message is tried again after a visibility timeout.
    pub unreadable: u64,
    pub timeout_interval_ms: u64,
}

/// Handle of a running queue. Cloning the handle gives another handle to the same queue, the queue
/// stops when all the handles (including the ones in consumers) are dropped or on `shutdown`.
#[derive(Clone)]
pub struct QueueService {
    sink: QueueCommandSink,
    shutdown: CancellationToken,
}

impl QueueService {
    /// Recover the messages of the store and start serving the queue.
    ///
    /// A store which cannot be enumerated makes the start fail.
    pub async fn start<S: Store>(store: S, config: QueueConfig) -> Result<Self> {
        let mut state = chk!(handler::recover(store, &config).await)?;
        let (sink, mut stream) = mpsc::channel(COMMAND_BUFFER);
        let shutdown = CancellationToken::new();
        let stop = shutdown.clone();

        tokio::spawn(async move {
            state.queue_loop(&mut stream, stop).await;
        });

        Ok(QueueService { sink, shutdown })
    }

    pub async fn in_memory(config: QueueConfig) -> Result<Self> {
        Self::start(MemoryStore::new(), config).await
    }

    /// Start a durable queue keeping its messages in `dir`.
    pub async fn file_based(dir: impl AsRef<Path>, config: QueueConfig) -> Result<Self> {
        let store = FileStore::open(dir).await?;

        info!("Starting file based queue in {}", store.dir().display());

        Self::start(store, config).await
    }

    /// Store the payload and make it visible to consumers. The returned id is the delivery order of
    /// the message.
    pub async fn push(&self, payload: impl Into<Bytes>) -> Result<MessageId> {
        let (tx, rx) = oneshot::channel();

        self.send(QueueCommand::Push {
            payload: payload.into(),
            result: tx,
        })
        .await?;

        match rx.await {
            Ok(result) => result,
            Err(_) => closed_error(),
        }
    }

    /// Open a new consumer session with its own identity.
    pub fn consumer(&self) -> Consumer {
        Consumer::new(self.clone())
    }

    pub(crate) async fn pull(&self, consumer: ConsumerId) -> Result<Delivery> {
        let (tx, rx) = oneshot::channel();

        self.send(QueueCommand::Pull { consumer, result: tx }).await?;

        tokio::select! {
            delivery = rx => {
                match delivery {
                    Ok(delivery) => Ok(delivery),
                    Err(_) => closed_error(),
                }
            }
            _ = self.shutdown.cancelled() => {
                closed_error()
            }
        }
    }

    pub(crate) async fn delete(&self, consumer: ConsumerId, token: LeaseToken) -> bool {
        let (tx, rx) = oneshot::channel();

        if self
            .send(QueueCommand::Delete {
                consumer,
                token,
                result: tx,
            })
            .await
            .is_err()
        {
            return false;
        }

        rx.await.unwrap_or(false)
    }

    /// Change the visibility timeout. Leases already handed out keep their deadline.
    pub async fn set_timeout_interval(&self, interval: Duration) -> Result<()> {
        self.send(QueueCommand::SetTimeoutInterval(interval)).await
    }

    pub async fn stats(&self) -> Result<QueueStats> {
        let (tx, rx) = oneshot::channel();

        self.send(QueueCommand::GetStats(tx)).await?;

        match rx.await {
            Ok(stats) => Ok(stats),
            Err(_) => closed_error(),
        }
    }

    /// Stop the queue. Blocked pulls return with a `Closed` error, and so do all later calls.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled() || self.sink.is_closed()
    }

    async fn send(&self, command: QueueCommand) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return closed_error();
        }

        match self.sink.send(command).await {
            Ok(()) => Ok(()),
            Err(_) => closed_error(),
        }
    }
}
