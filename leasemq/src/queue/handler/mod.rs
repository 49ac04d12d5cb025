mod lease;
mod timeout;

use super::{QueueConfig, QueueStats};
use crate::consumer::{ConsumerId, LeaseToken};
use crate::message::{Delivery, IdGenerator, MessageId};
use crate::store::{Recovered, Store};
use crate::{chk, logerr, Result};
use bytes::Bytes;
use lease::Lease;
use log::{debug, error, info, trace, warn};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::time::Duration;
use timeout::TimeoutScheduler;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub(crate) type QueueCommandSink = mpsc::Sender<QueueCommand>;

#[derive(Debug)]
pub(crate) enum QueueCommand {
    Push {
        payload: Bytes,
        result: oneshot::Sender<Result<MessageId>>,
    },
    Pull {
        consumer: ConsumerId,
        result: oneshot::Sender<Delivery>,
    },
    Delete {
        consumer: ConsumerId,
        token: LeaseToken,
        result: oneshot::Sender<bool>,
    },
    SetTimeoutInterval(Duration),
    GetStats(oneshot::Sender<QueueStats>),
}

/// A consumer blocked in pull.
#[derive(Debug)]
struct PendingPull {
    consumer: ConsumerId,
    result: oneshot::Sender<Delivery>,
}

#[derive(Debug, Default)]
struct Counters {
    pushed: u64,
    released: u64,
    expired: u64,
    unreadable: u64,
}

/// The state of a queue, owned by the queue loop. Every mutation happens in the loop, one command
/// or one expiry at a time, so a delete and the expiry of the same lease cannot both win.
pub(crate) struct QueueState<S: Store> {
    store: S,
    ids: IdGenerator,
    /// Ids of the visible messages, the first one is delivered next.
    backlog: BTreeSet<MessageId>,
    /// Active leases, including the ones holding back unreadable messages. Every stored message
    /// is either in the backlog or here.
    leases: HashMap<LeaseToken, Lease>,
    timeouts: TimeoutScheduler,
    waiting: VecDeque<PendingPull>,
    timeout_interval: Duration,
    counters: Counters,
}

/// Build the queue state from the records found in the store. The id generator continues after
/// the highest id the store has ever committed.
pub(crate) async fn recover<S: Store>(mut store: S, config: &QueueConfig) -> Result<QueueState<S>> {
    let Recovered { ids, last_id } = store.recover().await?;

    if !ids.is_empty() {
        info!("Queue recovered {} messages, last id is {:?}", ids.len(), last_id);
    }

    Ok(QueueState {
        store,
        ids: IdGenerator::after(last_id)?,
        backlog: ids.into_iter().collect(),
        leases: HashMap::new(),
        timeouts: TimeoutScheduler::default(),
        waiting: VecDeque::new(),
        timeout_interval: config.visibility_timeout,
        counters: Counters::default(),
    })
}

impl<S: Store> QueueState<S> {
    pub(crate) async fn queue_loop(&mut self, commands: &mut mpsc::Receiver<QueueCommand>, shutdown: CancellationToken) {
        loop {
            let next_deadline = self.timeouts.next_deadline();

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Queue is shut down with {} visible and {} leased messages", self.backlog.len(), self.leases.len());

                    break;
                }
                command = commands.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        None => {
                            // All the service handles are dropped.
                            break;
                        }
                    }
                }
                _ = sleep_until(next_deadline) => {
                    self.expire_due().await;
                }
            }
        }
    }

    pub(crate) async fn handle_command(&mut self, command: QueueCommand) {
        match command {
            QueueCommand::Push { payload, result } => {
                let id = self.push(payload).await;

                logerr!(result.send(id));
            }
            QueueCommand::Pull { consumer, result } => {
                self.expire_due().await;

                self.waiting.retain(|p| !p.result.is_closed());
                self.waiting.push_back(PendingPull { consumer, result });

                self.dispatch().await;
            }
            QueueCommand::Delete {
                consumer,
                token,
                result,
            } => {
                self.expire_due().await;

                let deleted = self.delete(consumer, token).await;

                logerr!(result.send(deleted));
            }
            QueueCommand::SetTimeoutInterval(interval) => {
                info!("Visibility timeout is changed to {:?}", interval);

                self.timeout_interval = interval;
            }
            QueueCommand::GetStats(result) => {
                logerr!(result.send(self.stats()));
            }
        }
    }

    async fn push(&mut self, payload: Bytes) -> Result<MessageId> {
        // The id is burnt even if the write fails, there may be a partial record of it.
        let id = chk!(self.ids.next_id())?;

        chk!(self.store.write(id, payload).await)?;

        self.backlog.insert(id);
        self.counters.pushed += 1;

        trace!("Message {} is pushed", id);

        self.dispatch().await;

        Ok(id)
    }

    /// Hand out visible messages to the waiting consumers, lowest id to the longest waiting
    /// consumer.
    async fn dispatch(&mut self) {
        while let Some(id) = self.backlog.first().copied() {
            let Some(pending) = self.waiting.pop_front() else {
                break;
            };

            if pending.result.is_closed() {
                trace!("Consumer {} doesn't wait anymore", pending.consumer);

                continue;
            }

            self.backlog.remove(&id);

            let token = LeaseToken::new();
            let deadline = Instant::now() + self.timeout_interval;

            let payload = match self.store.read(id).await {
                Ok(payload) => payload,
                Err(e) => {
                    error!("Cannot load message {}, it is retried after {:?} {:?}", id, self.timeout_interval, e);

                    self.counters.unreadable += 1;
                    self.leases.insert(token, Lease::retry(id, deadline));
                    self.timeouts.schedule(token, deadline);
                    self.waiting.push_front(pending);

                    continue;
                }
            };

            let delivery = Delivery { id, payload, token };

            match pending.result.send(delivery) {
                Ok(()) => {
                    trace!("Message {} is leased to {} with lease {}", id, pending.consumer, token);

                    self.leases.insert(token, Lease::new(id, pending.consumer, deadline));
                    self.timeouts.schedule(token, deadline);
                }
                Err(_) => {
                    debug!("Consumer {} left before getting message {}", pending.consumer, id);

                    self.backlog.insert(id);
                }
            }
        }
    }

    async fn delete(&mut self, consumer: ConsumerId, token: LeaseToken) -> bool {
        match self.leases.get(&token) {
            None => {
                debug!("Consumer {} has no active lease {}", consumer, token);

                return false;
            }
            Some(lease) if !lease.is_held_by(consumer) => {
                warn!(
                    "Consumer {} tried to delete message {} leased by {:?}",
                    consumer, lease.message_id, lease.owner
                );

                return false;
            }
            Some(_) => (),
        }

        let Some(lease) = self.leases.remove(&token) else {
            return false;
        };

        self.timeouts.cancel(&token);
        self.counters.released += 1;

        debug_assert_eq!(self.timeouts.len(), self.leases.len());

        trace!(
            "Message {} is deleted by {}, {:?} before its deadline",
            lease.message_id,
            consumer,
            lease.deadline.saturating_duration_since(Instant::now())
        );

        // The consumer did its job, a record left behind is only redelivered after a restart.
        if let Err(e) = self.store.remove(lease.message_id).await {
            error!("Cannot remove record of deleted message {} {:?}", lease.message_id, e);
        }

        true
    }

    /// Put the messages of the elapsed leases back to the backlog.
    async fn expire_due(&mut self) {
        let expired = self.timeouts.pop_expired(Instant::now());

        if expired.is_empty() {
            return;
        }

        for token in expired {
            let Some(lease) = self.leases.remove(&token) else {
                continue;
            };

            match lease.owner {
                Some(owner) => {
                    info!(
                        "Lease of message {} held by {} expired, message is visible again",
                        lease.message_id, owner
                    );

                    self.counters.expired += 1;
                }
                None => debug!("Message {} is visible again after a failed read", lease.message_id),
            }

            self.backlog.insert(lease.message_id);
        }

        debug_assert_eq!(self.timeouts.len(), self.leases.len());

        self.dispatch().await;
    }

    fn stats(&self) -> QueueStats {
        QueueStats {
            visible: self.backlog.len(),
            in_flight: self.leases.len(),
            waiting_consumers: self.waiting.iter().filter(|p| !p.result.is_closed()).count(),
            next_id: self.ids.peek(),
            pushed: self.counters.pushed,
            released: self.counters.released,
            expired: self.counters.expired,
            unreadable: self.counters.unreadable,
            timeout_interval_ms: self.timeout_interval.as_millis() as u64,
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
