//! Bounded FIFO task queue with a force path.
//!
//! The queue does no locking of its own: it lives inside the pool state and
//! every call happens under the pool mutex, so admission decisions that look
//! at the queue and at the worker set are atomic together.

use std::collections::VecDeque;
use std::num::NonZeroUsize;

/// FIFO of pending items with a nominal capacity.
#[derive(Debug)]
pub struct TaskQueue<T> {
    items: VecDeque<T>,
    capacity: Option<NonZeroUsize>,
}

impl<T> TaskQueue<T> {
    /// Create a queue; `None` means unbounded.
    pub fn new(capacity: Option<NonZeroUsize>) -> Self {
        let initial = capacity.map_or(16, |c| c.get().min(1024));
        Self {
            items: VecDeque::with_capacity(initial),
            capacity,
        }
    }

    /// Append `item` if below capacity, otherwise hand it back.
    pub fn offer(&mut self, item: T) -> Result<(), T> {
        if self.is_full() {
            return Err(item);
        }
        self.items.push_back(item);
        Ok(())
    }

    /// Append `item` regardless of capacity.
    ///
    /// Callers decide whether forcing is allowed; the queue only records it.
    pub fn force(&mut self, item: T) {
        self.items.push_back(item);
    }

    /// Take the oldest item.
    pub fn poll(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Remove every pending item in arrival order.
    pub fn drain(&mut self) -> Vec<T> {
        self.items.drain(..).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Nominal capacity (None = unbounded).
    #[inline]
    pub fn capacity(&self) -> Option<usize> {
        self.capacity.map(NonZeroUsize::get)
    }

    /// True when a plain `offer` would be refused.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.capacity
            .is_some_and(|cap| self.items.len() >= cap.get())
    }

    /// Items held beyond the nominal capacity through `force`.
    pub fn overshoot(&self) -> usize {
        self.capacity
            .map_or(0, |cap| self.items.len().saturating_sub(cap.get()))
    }
}
