//! Lifecycle-managed executor facade.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::oneshot;

use super::lifecycle::{Lifecycle, LifecycleGuard, LifecycleState};
use super::pool::{Job, PoolError, PoolResult, PoolStats, TaskThreadFactory, ThreadFactory, ThreadPool};
use super::{Executor, ResizableExecutor};
use crate::config::{validate_bounds, ConfigError, ExecutorConfig};

type FactoryFn = dyn Fn(&ExecutorConfig) -> Box<dyn ThreadFactory> + Send + Sync;

/// Executor that owns a [`ThreadPool`] only while started.
///
/// Start builds a fresh queue and worker set from the current
/// configuration; stop tears them down immediately and drops them. Submission
/// and resize are only accepted while started.
pub struct StandardExecutor {
    config: RwLock<ExecutorConfig>,
    lifecycle: Lifecycle,
    pool: RwLock<Option<Arc<ThreadPool>>>,
    factory: Box<FactoryFn>,
}

impl StandardExecutor {
    /// Create an executor in the `New` state.
    pub fn new(config: ExecutorConfig) -> Result<Self, PoolError> {
        Self::with_thread_factory(config, |config| {
            Box::new(TaskThreadFactory::from_config(config))
        })
    }

    /// Create an executor whose pools get their threads from `factory`.
    pub fn with_thread_factory<F>(config: ExecutorConfig, factory: F) -> Result<Self, PoolError>
    where
        F: Fn(&ExecutorConfig) -> Box<dyn ThreadFactory> + Send + Sync + 'static,
    {
        config.validate()?;
        Ok(Self {
            lifecycle: Lifecycle::new(config.name.clone()),
            config: RwLock::new(config),
            pool: RwLock::new(None),
            factory: Box::new(factory),
        })
    }

    /// Replace the configuration. Only legal before start or after stop.
    pub fn configure(&self, config: ExecutorConfig) -> PoolResult<()> {
        let guard = self.lifecycle.lock();
        if !guard.state().is_configurable() {
            return Err(PoolError::IllegalState {
                expected: LifecycleState::New,
                actual: guard.state(),
            });
        }
        config.validate()?;
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
        Ok(())
    }

    /// Snapshot of the configuration.
    pub fn config(&self) -> ExecutorConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.current()
    }

    /// `New` -> `Initialized`. Repeated calls are no-ops.
    pub fn init(&self) -> PoolResult<()> {
        let mut guard = self.lifecycle.lock();
        match guard.state() {
            LifecycleState::New => {
                guard.set(LifecycleState::Initializing);
                guard.set(LifecycleState::Initialized);
                Ok(())
            }
            LifecycleState::Initialized => Ok(()),
            actual => Err(PoolError::IllegalState {
                expected: LifecycleState::New,
                actual,
            }),
        }
    }

    /// Build a fresh pool and accept work.
    pub fn start(&self) -> PoolResult<()> {
        let mut guard = self.lifecycle.lock();
        let state = guard.state();
        if !state.can_start() {
            return Err(PoolError::IllegalState {
                expected: LifecycleState::Initialized,
                actual: state,
            });
        }
        if state == LifecycleState::New {
            guard.set(LifecycleState::Initializing);
            guard.set(LifecycleState::Initialized);
        }

        guard.set(LifecycleState::Starting);
        let config = self.config();

        let pool = match self.build_pool(&config) {
            Ok(pool) => pool,
            Err(e) => {
                tracing::error!(executor = %config.name, error = %e, "executor failed to start");
                guard.set(LifecycleState::Failed);
                return Err(e);
            }
        };

        *self.pool.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(pool));
        guard.set(LifecycleState::Started);

        tracing::info!(
            executor = %config.name,
            min_spare_threads = config.min_spare_threads,
            max_threads = config.max_threads,
            prestart = config.prestart_min_spare_threads,
            "executor started"
        );
        Ok(())
    }

    fn build_pool(&self, config: &ExecutorConfig) -> PoolResult<ThreadPool> {
        let factory = (self.factory)(config);
        let pool = ThreadPool::with_factory(config, factory)?;
        if config.prestart_min_spare_threads {
            pool.prestart_core_threads()?;
        }
        Ok(pool)
    }

    /// Immediate shutdown: queued items are discarded, workers are released
    /// and the pool is dropped. Never fails; repeated calls are no-ops.
    pub fn stop(&self) {
        let mut guard = self.lifecycle.lock();
        self.stop_locked(&mut guard);
    }

    fn stop_locked(&self, guard: &mut LifecycleGuard<'_>) {
        match guard.state() {
            state if state.needs_stop() => {
                guard.set(LifecycleState::Stopping);
                let pool = self
                    .pool
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                if let Some(pool) = pool {
                    pool.shutdown_now();
                }
                guard.set(LifecycleState::Stopped);
                tracing::info!(executor = %self.lifecycle_name(), "executor stopped");
            }
            LifecycleState::New | LifecycleState::Initialized => {
                guard.set(LifecycleState::Stopped);
            }
            state => {
                tracing::debug!(state = %state, "stop ignored");
            }
        }
    }

    /// Stop if needed, then move to `Destroyed`. Idempotent.
    pub fn destroy(&self) {
        let mut guard = self.lifecycle.lock();
        if matches!(
            guard.state(),
            LifecycleState::Destroying | LifecycleState::Destroyed
        ) {
            return;
        }
        self.stop_locked(&mut guard);
        guard.set(LifecycleState::Destroying);
        guard.set(LifecycleState::Destroyed);
    }

    fn lifecycle_name(&self) -> String {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .name
            .clone()
    }

    fn started_pool(&self) -> PoolResult<Arc<ThreadPool>> {
        // Clone out so a blocked timed submission never holds the lock stop needs.
        let pool = self
            .pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        pool.ok_or_else(|| PoolError::not_started(self.lifecycle.current()))
    }

    /// Submit a closure.
    pub fn submit<F>(&self, f: F) -> PoolResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.execute(Box::new(f))
    }

    /// Submit a closure, waiting up to `timeout` for admission.
    pub fn submit_timeout<F>(&self, f: F, timeout: Duration) -> PoolResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.execute_timeout(Box::new(f), timeout)
    }

    /// Submit a closure and get its result through a oneshot channel.
    ///
    /// The receiver errors if the closure panics or the item is discarded by
    /// a shutdown.
    pub fn submit_with_result<F, T>(&self, f: F) -> PoolResult<oneshot::Receiver<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.submit(move || {
            let _ = tx.send(f());
        })?;
        Ok(rx)
    }

    /// Ask workers to renew so per-thread state tied to a stopping context
    /// is released. No-op when not started.
    pub fn notify_context_stopping(&self) {
        if let Ok(pool) = self.started_pool() {
            pool.context_stopping();
        }
    }

    /// Statistics snapshot; zeros (with the configured max) when not started.
    pub fn stats(&self) -> PoolStats {
        match self.started_pool() {
            Ok(pool) => pool.stats(),
            Err(_) => PoolStats {
                max_pool_size: self
                    .config
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .max_threads,
                ..Default::default()
            },
        }
    }

    /// Change the idle timeout, live if started.
    pub fn set_max_idle_time(&self, idle: Duration) -> Result<(), ConfigError> {
        if idle.is_zero() {
            return Err(ConfigError::invalid(
                "max_idle_time",
                "idle time must be greater than zero",
            ));
        }
        self.config
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .max_idle_time = idle;
        if let Ok(pool) = self.started_pool() {
            pool.set_keep_alive(idle);
        }
        Ok(())
    }

    /// Change the renewal delay, live if started. None disables renewal.
    pub fn set_thread_renewal_delay(&self, delay: Option<Duration>) -> Result<(), ConfigError> {
        if delay.is_some_and(|d| d.is_zero()) {
            return Err(ConfigError::invalid(
                "thread_renewal_delay",
                "use None to disable renewal",
            ));
        }
        self.config
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .thread_renewal_delay = delay;
        if let Ok(pool) = self.started_pool() {
            pool.set_renewal_delay(delay);
        }
        Ok(())
    }

    /// Change the worker ceiling. Unlike `resize_pool`, the value is kept
    /// in the configuration and survives a restart.
    pub fn set_max_threads(&self, max_threads: usize) -> Result<(), ConfigError> {
        self.update_bounds(|config| config.max_threads = max_threads)
    }

    /// Change the core worker count, live if started and kept across restarts.
    pub fn set_min_spare_threads(&self, min_spare_threads: usize) -> Result<(), ConfigError> {
        self.update_bounds(|config| config.min_spare_threads = min_spare_threads)
    }

    fn update_bounds(&self, apply: impl FnOnce(&mut ExecutorConfig)) -> Result<(), ConfigError> {
        let (core, max) = {
            let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
            let mut next = config.clone();
            apply(&mut next);
            validate_bounds(next.min_spare_threads, next.max_threads)?;
            *config = next;
            (config.min_spare_threads, config.max_threads)
        };

        if let Ok(pool) = self.started_pool() {
            // A pool shut down in between has nothing left to resize.
            if let Err(e) = pool.resize(core, max) {
                tracing::debug!(executor = %pool.name(), error = %e, "live bounds not applied");
            }
        }
        Ok(())
    }
}

impl Executor for StandardExecutor {
    fn execute(&self, job: Job) -> PoolResult<()> {
        self.started_pool()?.execute(job)
    }

    fn execute_timeout(&self, job: Job, timeout: Duration) -> PoolResult<()> {
        self.started_pool()?.execute_timeout(job, timeout)
    }

    fn name(&self) -> String {
        self.lifecycle_name()
    }
}

impl ResizableExecutor for StandardExecutor {
    fn pool_size(&self) -> usize {
        self.started_pool().map_or(0, |pool| pool.pool_size())
    }

    fn max_threads(&self) -> usize {
        match self.started_pool() {
            Ok(pool) => pool.bounds().max,
            Err(_) => self.config().max_threads,
        }
    }

    fn active_count(&self) -> usize {
        self.started_pool().map_or(0, |pool| pool.active_count())
    }

    fn resize_pool(&self, core: usize, max: usize) -> bool {
        let Ok(pool) = self.started_pool() else {
            return false;
        };
        if let Err(e) = validate_bounds(core, max) {
            tracing::warn!(executor = %pool.name(), error = %e, "resize refused");
            return false;
        }
        pool.resize(core, max).is_ok()
    }

    fn resize_queue(&self, _capacity: usize) -> bool {
        false
    }
}

impl Drop for StandardExecutor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for StandardExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandardExecutor")
            .field("name", &self.lifecycle_name())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
