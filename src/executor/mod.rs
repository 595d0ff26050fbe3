//! Executors for elastic_executor.
//!
//! [`StandardExecutor`] is the component callers hold: it gates every
//! operation on its [`LifecycleState`] and owns a [`ThreadPool`] only while
//! started. The pool itself lives in [`pool`].
//!
//! # Example
//!
//! ```rust,ignore
//! use elastic_executor::config::ExecutorConfig;
//! use elastic_executor::executor::{ResizableExecutor, StandardExecutor};
//!
//! let executor = StandardExecutor::new(ExecutorConfig::default().with_threads(4, 16))?;
//! executor.start()?;
//! executor.submit(|| println!("hello from a worker"))?;
//! executor.resize_pool(8, 32);
//! executor.stop();
//! ```
//!
//! # Admission
//!
//! ```text
//! ┌──────────┐  below core / no idle worker   ┌─────────────┐
//! │ submit() │───────────────────────────────▶│ new worker  │
//! └────┬─────┘                                └─────────────┘
//!      │ idle worker or at max
//!      ▼
//! ┌──────────┐  full   ┌────────────────┐  no workers  ┌──────────┐
//! │  offer   │────────▶│ force (plain)  │─────────────▶│ Rejected │
//! └──────────┘         │ wait (timed)   │  deadline    └──────────┘
//!                      └────────────────┘
//! ```

pub mod lifecycle;
pub mod pool;
mod standard;

pub use lifecycle::{Lifecycle, LifecycleState};
pub use pool::{Job, PoolError, PoolResult, PoolStats, RejectReason, ThreadPool};
pub use standard::StandardExecutor;

use std::time::Duration;

/// Something that runs submitted jobs.
pub trait Executor: Send + Sync {
    /// Submit a job. Fails with `Rejected` when saturated or `IllegalState`
    /// when not started.
    fn execute(&self, job: Job) -> PoolResult<()>;

    /// Submit a job, waiting up to `timeout` for admission.
    fn execute_timeout(&self, job: Job, timeout: Duration) -> PoolResult<()>;

    /// Name used in logs and errors.
    fn name(&self) -> String;
}

/// An executor whose worker bounds can change while it runs.
pub trait ResizableExecutor: Executor {
    /// Current number of live workers.
    fn pool_size(&self) -> usize;

    /// Current worker ceiling.
    fn max_threads(&self) -> usize;

    /// Workers currently running a job.
    fn active_count(&self) -> usize;

    /// Apply new `(core, max)` bounds. False when not started or the pair is
    /// invalid.
    fn resize_pool(&self, core: usize, max: usize) -> bool;

    /// Queue resizing is not supported; always false.
    fn resize_queue(&self, capacity: usize) -> bool;
}
