//! Resizable worker pool.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                        ThreadPool                          │
//! ├────────────────────────────────────────────────────────────┤
//! │   execute() ──▶ spawn worker ─┐ (below core / below max)   │
//! │        │                      │                            │
//! │        └──────▶ TaskQueue ◀───┘ force (past capacity)      │
//! │                     │                                      │
//! │       ┌─────────────┼─────────────┐                        │
//! │  ┌────▼────┐   ┌────▼────┐   ┌────▼────┐                   │
//! │  │ Worker1 │   │ Worker2 │   │ WorkerN │  core..=max       │
//! │  └─────────┘   └─────────┘   └─────────┘  renewed one      │
//! │                                           at a time        │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Queue, worker set and bounds share one mutex; workers park on a condvar
//! while idle and exit after the idle timeout when above the core count.

mod error;
mod queue;
mod thread;
mod worker;

pub use error::{PoolError, PoolResult, RejectReason};
pub use queue::TaskQueue;
pub use thread::{Bounds, ThreadPool};
pub use worker::{nice_for, TaskThreadFactory, ThreadFactory, Worker, WorkerBody, WorkerId};

use serde::Serialize;

/// A unit of work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Statistics about a pool, recomputed on every query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Workers currently running an item.
    pub active_count: usize,
    /// Items that finished running (including ones that panicked).
    pub completed_count: u64,
    pub core_pool_size: usize,
    pub max_pool_size: usize,
    /// Highest worker count seen since start.
    pub largest_pool_size: usize,
    /// Live workers.
    pub current_pool_size: usize,
    /// Items waiting in the queue.
    pub queue_depth: usize,
    /// Submissions refused.
    pub rejected_count: u64,
    /// Items that panicked.
    pub failed_count: u64,
    /// Workers retired and replaced by renewal.
    pub renewed_count: u64,
}

impl PoolStats {
    /// Workers alive but not running anything.
    pub fn idle_count(&self) -> usize {
        self.current_pool_size.saturating_sub(self.active_count)
    }
}
