//! Prometheus metrics for executor pools.
//!
//! Each metric mirrors one [`PoolStats`] field and is refreshed by
//! [`PoolMetrics::observe`]. Sizes are gauges. Running totals are counters
//! advanced by the difference from the previous snapshot; a smaller total
//! means the pool restarted, so the counter starts over from it.

use prometheus::{Encoder, Gauge, IntCounter, Opts, Registry, TextEncoder};

use crate::executor::PoolStats;

/// Gauges and counters for one executor, labelled with its name.
pub struct PoolMetrics {
    registry: Registry,

    /// Workers currently running a job
    pub active_threads: Gauge,
    /// Live workers
    pub pool_threads: Gauge,
    /// Core worker count
    pub core_threads: Gauge,
    /// Worker ceiling
    pub max_threads: Gauge,
    /// High-water mark of live workers
    pub largest_pool_threads: Gauge,
    /// Jobs waiting in the queue
    pub queue_depth: Gauge,
    /// Jobs finished, including failed ones
    pub completed_tasks: IntCounter,
    /// Jobs that panicked
    pub failed_tasks: IntCounter,
    /// Submissions refused
    pub rejected_tasks: IntCounter,
    /// Workers retired by renewal
    pub renewed_threads: IntCounter,
}

impl PoolMetrics {
    /// Create a registry with every metric labelled `executor="{name}"`.
    pub fn new(executor: &str) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let gauge = |name: &str, help: &str| -> Result<Gauge, prometheus::Error> {
            let g = Gauge::with_opts(Opts::new(name, help).const_label("executor", executor))?;
            registry.register(Box::new(g.clone()))?;
            Ok(g)
        };
        let counter = |name: &str, help: &str| -> Result<IntCounter, prometheus::Error> {
            let c = IntCounter::with_opts(Opts::new(name, help).const_label("executor", executor))?;
            registry.register(Box::new(c.clone()))?;
            Ok(c)
        };

        Ok(Self {
            active_threads: gauge("executor_active_threads", "Workers running a job")?,
            pool_threads: gauge("executor_pool_threads", "Live worker threads")?,
            core_threads: gauge("executor_core_threads", "Core worker count")?,
            max_threads: gauge("executor_max_threads", "Maximum worker count")?,
            largest_pool_threads: gauge(
                "executor_largest_pool_threads",
                "Largest number of live workers observed",
            )?,
            queue_depth: gauge("executor_queue_depth", "Jobs waiting in the queue")?,
            completed_tasks: counter("executor_completed_tasks_total", "Jobs finished")?,
            failed_tasks: counter("executor_failed_tasks_total", "Jobs that panicked")?,
            rejected_tasks: counter("executor_rejected_tasks_total", "Submissions rejected")?,
            renewed_threads: counter(
                "executor_renewed_threads_total",
                "Workers retired by renewal",
            )?,
            registry,
        })
    }

    /// Copy a stats snapshot into the metrics.
    pub fn observe(&self, stats: &PoolStats) {
        self.active_threads.set(stats.active_count as f64);
        self.pool_threads.set(stats.current_pool_size as f64);
        self.core_threads.set(stats.core_pool_size as f64);
        self.max_threads.set(stats.max_pool_size as f64);
        self.largest_pool_threads.set(stats.largest_pool_size as f64);
        self.queue_depth.set(stats.queue_depth as f64);
        advance(&self.completed_tasks, stats.completed_count);
        advance(&self.failed_tasks, stats.failed_count);
        advance(&self.rejected_tasks, stats.rejected_count);
        advance(&self.renewed_threads, stats.renewed_count);
    }

    /// Export metrics in Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    /// Get the Prometheus registry (for custom metrics).
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

fn advance(counter: &IntCounter, total: u64) {
    let seen = counter.get();
    if total >= seen {
        counter.inc_by(total - seen);
    } else {
        counter.reset();
        counter.inc_by(total);
    }
}
