//! Observability for executor pools.
//!
//! Structured logging lives in [`crate::logging`]; this module exports pool
//! statistics as Prometheus metrics.
//!
//! ```rust,ignore
//! use elastic_executor::observability::PoolMetrics;
//!
//! let metrics = PoolMetrics::new(&executor.name())?;
//! metrics.observe(&executor.stats());
//! println!("{}", metrics.render()?);
//! ```

pub mod metrics;

pub use metrics::PoolMetrics;
