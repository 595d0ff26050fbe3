//! elastic_executor - an elastic, lifecycle-managed thread pool.
//!
//! Jobs are plain `FnOnce() + Send` closures. The pool keeps a core set of
//! workers, grows to a ceiling before it queues, forces past a full queue
//! while any worker exists, and periodically renews aged workers so that
//! per-thread state does not outlive a context reload.
//!
//! # Features
//!
//! - **Elastic sizing**: core/max bounds, idle timeout, live resize
//! - **Lifecycle**: init/start/stop/destroy with restart from stopped
//! - **Thread renewal**: staggered replacement of aged workers
//! - **Structured logging**: JSON or text via tracing
//! - **Metrics**: Prometheus gauges for every pool statistic
//!
//! # Example
//!
//! ```rust,ignore
//! use elastic_executor::{ExecutorConfig, StandardExecutor};
//!
//! let executor = StandardExecutor::new(ExecutorConfig::default().with_threads(2, 8))?;
//! executor.start()?;
//! executor.submit(|| println!("hello"))?;
//! executor.stop();
//! ```

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit hash (8 chars) with optional "-dirty" suffix
pub const BUILD_VERSION: &str = env!("BUILD_VERSION");

/// Full version string: "0.1.0 (abc12345)" or "0.1.0 ()" without git
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_VERSION"), ")");

pub mod config;
pub mod executor;
pub mod logging;
pub mod observability;

// Re-exports for convenience
pub use config::{Config, ExecutorConfig};
pub use executor::{
    Executor, PoolError, PoolResult, PoolStats, RejectReason, ResizableExecutor,
    StandardExecutor,
};
