use crate::consumer::LeaseToken;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use tokio::time::Instant;

/// Deadlines of the active leases, ordered by time.
///
/// Cancelling only removes the lease from `pending`, the heap entry stays there until its
/// deadline and is skipped then.
#[derive(Debug, Default)]
pub(crate) struct TimeoutScheduler {
    heap: BinaryHeap<Reverse<(Instant, LeaseToken)>>,
    pending: HashMap<LeaseToken, Instant>,
}

impl TimeoutScheduler {
    pub(crate) fn schedule(&mut self, token: LeaseToken, deadline: Instant) {
        self.pending.insert(token, deadline);
        self.heap.push(Reverse((deadline, token)));
    }

    /// Returns false if the lease had no pending deadline.
    pub(crate) fn cancel(&mut self, token: &LeaseToken) -> bool {
        self.pending.remove(token).is_some()
    }

    /// The earliest deadline which is still pending.
    pub(crate) fn next_deadline(&mut self) -> Option<Instant> {
        while let Some(Reverse((deadline, token))) = self.heap.peek() {
            if self.is_pending(token, deadline) {
                return Some(*deadline);
            }

            self.heap.pop();
        }

        None
    }

    /// Take the leases whose deadline is not later than `now`, earliest first.
    pub(crate) fn pop_expired(&mut self, now: Instant) -> Vec<LeaseToken> {
        let mut expired = vec![];

        while let Some(Reverse((deadline, token))) = self.heap.peek() {
            if *deadline > now {
                break;
            }

            if self.is_pending(token, deadline) {
                self.pending.remove(token);
                expired.push(*token);
            }

            self.heap.pop();
        }

        expired
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    fn is_pending(&self, token: &LeaseToken, deadline: &Instant) -> bool {
        self.pending.get(token) == Some(deadline)
    }
}
