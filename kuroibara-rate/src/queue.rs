//! Priority wait queue with FIFO tiebreak and anti-starvation promotion.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use kuroibara_types::KuroibaraError;
use tokio::sync::oneshot;

/// Caller-declared priority. Higher values are serviced first; within a
/// priority level, FIFO order applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority(pub u8);

impl Priority {
    /// Lowest priority level.
    pub const LOW: Self = Self(0);
    /// Default priority level.
    pub const NORMAL: Self = Self(1);
    /// Highest priority level.
    pub const HIGH: Self = Self(2);

    /// Promote one level, saturating at `HIGH`.
    #[must_use]
    pub const fn promoted(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

/// A queued caller awaiting a permit.
pub struct Waiter {
    priority: Priority,
    enqueued_at: Instant,
    seq: u64,
    responder: Option<oneshot::Sender<Result<(), KuroibaraError>>>,
}

impl Waiter {
    fn effective_priority(&self, now: Instant, max_wait: Duration) -> Priority {
        let half = max_wait / 2;
        if half > Duration::ZERO && now.saturating_duration_since(self.enqueued_at) >= half {
            self.priority.promoted()
        } else {
            self.priority
        }
    }
}

impl PartialEq for Waiter {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl Eq for Waiter {}

impl PartialOrd for Waiter {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Waiter {
    /// `BinaryHeap` is a max-heap: higher priority sorts first, and for
    /// equal priority the *older* (lower `seq`) waiter sorts first (FIFO).
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
        .cmp(&other.priority)
        .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// A bounded, priority-ordered queue of callers waiting on a source's token
/// bucket. Anti-starvation promotion is applied lazily at pop time rather
/// than by continuously re-sorting the heap.
pub struct WaitQueue {
    heap: BinaryHeap<Waiter>,
    next_seq: u64,
    max_depth: usize,
    max_wait: Duration,
}

impl WaitQueue {
    /// Create an empty queue bounded by `max_depth` entries.
    #[must_use]
    pub const fn new(max_depth: usize, max_wait: Duration) -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
            max_depth,
            max_wait,
        }
    }

    /// Number of callers currently waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether the queue currently holds no waiters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Enqueue a waiter. Returns `Err` immediately (queue-full) without
    /// touching the heap when at capacity.
    pub fn push(
        &mut self,
        priority: Priority,
        responder: oneshot::Sender<Result<(), KuroibaraError>>,
    ) -> Result<(), oneshot::Sender<Result<(), KuroibaraError>>> {
        if self.heap.len() >= self.max_depth {
            return Err(responder);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Waiter {
            priority,
            enqueued_at: Instant::now(),
            seq,
            responder: Some(responder),
        });
        Ok(())
    }

    /// Pop the highest (effective) priority waiter, applying anti-starvation
    /// promotion at comparison time. Returns `None` when empty.
    pub fn pop(&mut self) -> Option<Waiter> {
        if self.heap.is_empty() {
            return None;
        }
        let now = Instant::now();
        let max_wait = self.max_wait;
        let mut items: Vec<Waiter> = std::mem::take(&mut self.heap).into_vec();
        let best_index = items
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            a.effective_priority(now, max_wait)
            .cmp(&b.effective_priority(now, max_wait))
            .then_with(|| b.seq.cmp(&a.seq))
        })
        .map(|(idx, _)| idx)?;
        let winner = items.swap_remove(best_index);
        self.heap = items.into_iter().collect();
        Some(winner)
    }
}

impl Waiter {
    /// Resolve the waiter with a permit or a terminal error.
    pub fn resolve(mut self, result: Result<(), KuroibaraError>) {
        if let Some(tx) = self.responder.take() {
            let _ = tx.send(result);
        }
    }
}
