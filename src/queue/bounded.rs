//! FIFO queue with capacity and overflow policy.

use std::collections::VecDeque;

use serde_json::Value;

use crate::message::Message;

/// What happens when `enqueue` is called at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    DropOldest,
    DropNewest,
    Reject,
}

/// Result of a single `enqueue` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Accepted,
    AcceptedWithDrop,
    Rejected,
}

/// A `(message, dispatch-options)` pair as stored in the queue.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub message: Message,
    pub options: Value,
}

/// Counters kept by the queue itself (distinct from the Statistics facet,
/// which aggregates across the whole subsystem).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub full_events: u64,
}

/// Bounded FIFO. Invariant: `size() <= capacity()` always.
pub struct BoundedQueue {
    items: VecDeque<QueueItem>,
    capacity: usize,
    policy: OverflowPolicy,
    stats: QueueStats,
    on_full: Option<Box<dyn FnMut() + Send>>,
}

impl BoundedQueue {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            policy,
            stats: QueueStats::default(),
            on_full: None,
        }
    }

    /// Registers the single `full`-event subscriber slot. A later call
    /// replaces the prior subscriber, matching the "single subscriber slot"
    /// contract.
    pub fn on_full(&mut self, handler: impl FnMut() + Send + 'static) {
        self.on_full = Some(Box::new(handler));
    }

    pub fn enqueue(&mut self, item: QueueItem) -> EnqueueOutcome {
        if self.items.len() < self.capacity {
            self.items.push_back(item);
            return EnqueueOutcome::Accepted;
        }

        self.fire_full();
        match self.policy {
            OverflowPolicy::DropOldest => {
                self.items.pop_front();
                self.items.push_back(item);
                EnqueueOutcome::AcceptedWithDrop
            }
            OverflowPolicy::DropNewest | OverflowPolicy::Reject => EnqueueOutcome::Rejected,
        }
    }

    pub fn dequeue(&mut self) -> Option<QueueItem> {
        self.items.pop_front()
    }

    pub fn peek(&self) -> Option<&QueueItem> {
        self.items.front()
    }

    /// O(n) filter; an item is kept when `predicate` returns `true`.
    pub fn remove(&mut self, mut predicate: impl FnMut(&QueueItem) -> bool) {
        self.items.retain(|item| predicate(item));
    }

    pub fn size(&self) -> usize {
        self.items.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn stats(&self) -> QueueStats {
        self.stats
    }

    fn fire_full(&mut self) {
        self.stats.full_events += 1;
        if let Some(cb) = self.on_full.as_mut() {
            cb();
        }
    }
}
