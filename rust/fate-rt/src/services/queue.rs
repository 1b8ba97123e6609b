//! Batching FIFO work queue.
//!
//! The [`WorkQueue`] is a `Vec` plus a head index: pushes append, pops
//! advance the head. The consumed prefix is discarded only once it grows
//! past the compaction threshold and outweighs the live tail, so enqueue
//! stays amortized O(1) and compaction never reorders pending items.

use std::fmt;

/// Consumed slots tolerated before the queue compacts.
pub const DEFAULT_COMPACT_THRESHOLD: usize = 1024;

pub struct WorkQueue<T> {
    items: Vec<Option<T>>,
    head: usize,
    threshold: usize,
    compactions: usize,
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_COMPACT_THRESHOLD)
    }

    /// A queue that compacts after `threshold` consumed slots (minimum 1).
    pub fn with_threshold(threshold: usize) -> Self {
        Self { items: Vec::new(), head: 0, threshold: threshold.max(1), compactions: 0 }
    }

    pub fn push(&mut self, value: T) {
        self.items.push(Some(value));
    }

    /// Pop the oldest pending item.
    pub fn pop(&mut self) -> Option<T> {
        let value = self.items.get_mut(self.head)?.take();
        self.head += 1;
        self.maybe_compact();
        value
    }

    /// Take up to `max` pending items, oldest first.
    pub fn drain_batch(&mut self, max: usize) -> Vec<T> {
        let end = self.items.len().min(self.head.saturating_add(max));
        let batch: Vec<T> = self.items[self.head..end].iter_mut().filter_map(Option::take).collect();
        self.head = end;
        self.maybe_compact();
        batch
    }

    fn maybe_compact(&mut self) {
        if self.head == self.items.len() {
            self.items.clear();
            self.head = 0;
        } else if self.head >= self.threshold && self.head * 2 >= self.items.len() {
            tracing::trace!(consumed = self.head, pending = self.len(), "compacting work queue");
            self.items.drain(..self.head);
            self.head = 0;
            self.compactions += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.items.len() - self.head
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of compactions performed so far.
    pub fn compactions(&self) -> usize {
        self.compactions
    }
}

impl<T> fmt::Debug for WorkQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkQueue")
            .field("len", &self.len())
            .field("head", &self.head)
            .field("compactions", &self.compactions)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
