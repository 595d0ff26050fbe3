//! Resizable thread pool with force-overflow admission and staggered
//! worker renewal.

use std::collections::HashMap;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::error::{PoolError, PoolResult, RejectReason};
use super::queue::TaskQueue;
use super::worker::{TaskThreadFactory, ThreadFactory, Worker, WorkerId};
use super::{Job, PoolStats};
use crate::config::{validate_bounds, ConfigError, ExecutorConfig};
use crate::executor::lifecycle::LifecycleState;

/// Shortest idle park, so a zero wait cannot spin.
const MIN_PARK: Duration = Duration::from_millis(1);

/// Live worker-count bounds, read by every admission decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    /// Workers kept alive while idle.
    pub core: usize,
    /// Hard ceiling on live workers.
    pub max: usize,
}

/// Everything mutable, guarded by one mutex.
struct PoolState {
    queue: TaskQueue<Job>,
    workers: HashMap<WorkerId, Worker>,
    /// Jobs handed to a just-spawned worker, picked up on its first lock.
    first_tasks: HashMap<WorkerId, Job>,
    bounds: Bounds,
    /// Workers parked on `work_available`.
    idle: usize,
    largest: usize,
    next_id: WorkerId,
    keep_alive: Duration,
    renewal_delay: Option<Duration>,
    last_renewal: Option<Instant>,
    context_stopped_at: Option<Instant>,
    shutdown: bool,
}

impl PoolState {
    /// Whether worker `id` should retire for renewal right now.
    fn renewal_due(&self, id: WorkerId, now: Instant) -> bool {
        self.renewal_wait(id, now) == Some(Duration::ZERO)
    }

    /// Time until worker `id` may retire for renewal; None if it never will
    /// under the current settings.
    fn renewal_wait(&self, id: WorkerId, now: Instant) -> Option<Duration> {
        let delay = self.renewal_delay?;
        let worker = self.workers.get(&id)?;

        let stale = self
            .context_stopped_at
            .is_some_and(|stopped| worker.created_at() < stopped);
        let until_eligible = if stale {
            Duration::ZERO
        } else {
            let age = worker.age(now);
            if age > delay {
                Duration::ZERO
            } else {
                // Age must strictly exceed the delay.
                delay - age + Duration::from_millis(1)
            }
        };

        let until_slot = match self.last_renewal {
            Some(last) => (last + delay).saturating_duration_since(now),
            None => Duration::ZERO,
        };

        Some(until_eligible.max(until_slot))
    }

    fn capacity(&self) -> Option<usize> {
        self.queue.capacity()
    }
}

struct Shared {
    name: String,
    state: Mutex<PoolState>,
    /// Signalled when an item is queued or bounds change.
    work_available: Condvar,
    /// Signalled when a queued item is taken.
    space_available: Condvar,
    factory: Box<dyn ThreadFactory>,
    active: AtomicUsize,
    completed: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
    renewed: AtomicU64,
}

/// A thread pool whose worker count floats between `core` and `max`.
///
/// Admission order for a new item:
///
/// 1. below `core` workers: start a worker for it
/// 2. an idle worker is waiting: queue it and wake that worker
/// 3. below `max` workers: start a worker for it
/// 4. queue it if under capacity
/// 5. force it onto the queue if at least one worker exists (plain
///    submissions only), else reject
///
/// Dropping the pool shuts it down immediately.
pub struct ThreadPool {
    shared: Arc<Shared>,
}

impl ThreadPool {
    /// Create a pool using the default thread factory.
    pub fn new(config: &ExecutorConfig) -> Result<Self, ConfigError> {
        Self::with_factory(config, TaskThreadFactory::from_config(config))
    }

    /// Create a pool with a custom thread factory. No worker is started.
    pub fn with_factory<F: ThreadFactory>(
        config: &ExecutorConfig,
        factory: F,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let state = PoolState {
            queue: TaskQueue::new(config.max_queue_size),
            workers: HashMap::with_capacity(config.min_spare_threads),
            first_tasks: HashMap::new(),
            bounds: Bounds {
                core: config.min_spare_threads,
                max: config.max_threads,
            },
            idle: 0,
            largest: 0,
            next_id: 0,
            keep_alive: config.max_idle_time,
            renewal_delay: config.thread_renewal_delay,
            last_renewal: None,
            context_stopped_at: None,
            shutdown: false,
        };

        tracing::info!(
            pool = %config.name,
            core = config.min_spare_threads,
            max = config.max_threads,
            capacity = ?config.max_queue_size,
            "thread pool created"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                name: config.name.clone(),
                state: Mutex::new(state),
                work_available: Condvar::new(),
                space_available: Condvar::new(),
                factory: Box::new(factory),
                active: AtomicUsize::new(0),
                completed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
                renewed: AtomicU64::new(0),
            }),
        })
    }

    /// Get the pool name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Start workers until the core count is reached.
    pub fn prestart_core_threads(&self) -> PoolResult<usize> {
        let mut state = self.shared.lock_state();
        if state.shutdown {
            return Err(PoolError::not_started(LifecycleState::Stopped));
        }

        let mut started = 0;
        while state.workers.len() < state.bounds.core {
            self.shared
                .spawn_worker(&mut state)
                .map_err(|e| PoolError::Spawn(e.to_string()))?;
            started += 1;
        }
        Ok(started)
    }

    /// Submit an item, forcing it past the queue capacity when the pool is
    /// saturated but still has a worker to drain it.
    pub fn execute(&self, job: Job) -> PoolResult<()> {
        let shared = &self.shared;
        let mut state = shared.lock_state();
        if state.shutdown {
            return Err(PoolError::not_started(LifecycleState::Stopped));
        }

        let job = match shared.try_admit(&mut state, job) {
            Ok(()) => return Ok(()),
            Err(job) => job,
        };

        // The queue refused; contention may free a worker any moment.
        if state.workers.is_empty() {
            return Err(shared.reject(&state, RejectReason::QueueFull));
        }

        state.queue.force(job);
        shared.work_available.notify_one();
        tracing::trace!(
            pool = %shared.name,
            overshoot = state.queue.overshoot(),
            "item forced past queue capacity"
        );
        Ok(())
    }

    /// Submit an item, waiting up to `timeout` for room in the queue.
    ///
    /// There is no force path: if the deadline passes without admission the
    /// item is rejected. A zero timeout never blocks.
    pub fn execute_timeout(&self, job: Job, timeout: Duration) -> PoolResult<()> {
        let shared = &self.shared;
        let deadline = Instant::now().checked_add(timeout);
        let mut state = shared.lock_state();
        let mut job = job;

        loop {
            if state.shutdown {
                return Err(PoolError::not_started(LifecycleState::Stopped));
            }

            job = match shared.try_admit(&mut state, job) {
                Ok(()) => return Ok(()),
                Err(job) => job,
            };

            state = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(shared.reject(&state, RejectReason::DeadlineElapsed(timeout)));
                    }
                    shared
                        .space_available
                        .wait_timeout(state, remaining)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => shared
                    .space_available
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }

    /// Replace the live worker bounds.
    ///
    /// Raising `core` starts workers up to the new floor. Lowering `max`
    /// wakes idle workers so the excess retires; busy ones retire after
    /// their current item.
    pub fn resize(&self, core: usize, max: usize) -> PoolResult<()> {
        validate_bounds(core, max)?;

        let shared = &self.shared;
        let mut state = shared.lock_state();
        if state.shutdown {
            return Err(PoolError::not_started(LifecycleState::Stopped));
        }

        let previous = state.bounds;
        state.bounds = Bounds { core, max };

        while state.workers.len() < core {
            if let Err(e) = shared.spawn_worker(&mut state) {
                tracing::warn!(pool = %shared.name, error = %e, "could not grow to new core size");
                break;
            }
        }
        shared.work_available.notify_all();
        // A raised bound can admit a timed submission without any queue poll.
        shared.space_available.notify_all();

        tracing::info!(
            pool = %shared.name,
            old_core = previous.core,
            old_max = previous.max,
            core,
            max,
            workers = state.workers.len(),
            "pool resized"
        );
        Ok(())
    }

    /// Current bounds.
    pub fn bounds(&self) -> Bounds {
        self.shared.lock_state().bounds
    }

    pub fn set_keep_alive(&self, keep_alive: Duration) {
        let mut state = self.shared.lock_state();
        state.keep_alive = keep_alive;
        self.shared.work_available.notify_all();
    }

    pub fn set_renewal_delay(&self, delay: Option<Duration>) {
        let mut state = self.shared.lock_state();
        state.renewal_delay = delay;
        self.shared.work_available.notify_all();
    }

    /// Mark every current worker for renewal, one at a time.
    pub fn context_stopping(&self) {
        let mut state = self.shared.lock_state();
        if state.shutdown {
            return;
        }
        state.context_stopped_at = Some(Instant::now());
        self.shared.work_available.notify_all();

        tracing::debug!(
            pool = %self.shared.name,
            workers = state.workers.len(),
            renewal = state.renewal_delay.is_some(),
            "context stopping, workers marked for renewal"
        );
    }

    /// Stop immediately: discard queued items, release every worker and
    /// refuse further submissions. Does not wait for running items.
    ///
    /// Returns the number of discarded items.
    pub fn shutdown_now(&self) -> usize {
        let shared = &self.shared;
        let mut state = shared.lock_state();
        if state.shutdown {
            return 0;
        }
        state.shutdown = true;

        let mut discarded = state.queue.drain();
        discarded.extend(state.first_tasks.drain().map(|(_, job)| job));
        let workers: Vec<Worker> = state.workers.drain().map(|(_, w)| w).collect();
        drop(state);

        shared.work_available.notify_all();
        shared.space_available.notify_all();

        tracing::info!(
            pool = %shared.name,
            discarded = discarded.len(),
            workers = workers.len(),
            "thread pool shut down"
        );

        // Dropping the handles detaches the threads.
        let count = discarded.len();
        drop(discarded);
        drop(workers);
        count
    }

    /// Consistent-enough snapshot of the pool counters.
    pub fn stats(&self) -> PoolStats {
        let shared = &self.shared;
        let state = shared.lock_state();
        PoolStats {
            active_count: shared.active.load(Ordering::SeqCst),
            completed_count: shared.completed.load(Ordering::SeqCst),
            core_pool_size: state.bounds.core,
            max_pool_size: state.bounds.max,
            largest_pool_size: state.largest,
            current_pool_size: state.workers.len(),
            queue_depth: state.queue.len(),
            rejected_count: shared.rejected.load(Ordering::SeqCst),
            failed_count: shared.failed.load(Ordering::SeqCst),
            renewed_count: shared.renewed.load(Ordering::SeqCst),
        }
    }

    /// Current number of live workers.
    pub fn pool_size(&self) -> usize {
        self.shared.lock_state().workers.len()
    }

    /// Number of workers currently running an item.
    pub fn active_count(&self) -> usize {
        self.shared.active.load(Ordering::SeqCst)
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown_now();
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("name", &self.shared.name)
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Steps 1-4 of admission. Hands the item back if the queue is full.
    fn try_admit(self: &Arc<Self>, state: &mut PoolState, job: Job) -> Result<(), Job> {
        let workers = state.workers.len();
        let idle_available = state.idle > state.queue.len();

        if workers < state.bounds.core || (!idle_available && workers < state.bounds.max) {
            match self.spawn_worker(state) {
                Ok(id) => {
                    state.first_tasks.insert(id, job);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        pool = %self.name,
                        workers,
                        error = %e,
                        "failed to start worker, queueing instead"
                    );
                }
            }
        }

        state.queue.offer(job)?;
        self.work_available.notify_one();
        Ok(())
    }

    fn reject(&self, state: &PoolState, reason: RejectReason) -> PoolError {
        self.rejected.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            pool = %self.name,
            queued = state.queue.len(),
            workers = state.workers.len(),
            reason = ?reason,
            "submission rejected"
        );
        PoolError::Rejected {
            pool: self.name.clone(),
            reason,
            queued: state.queue.len(),
            capacity: state.capacity(),
        }
    }

    /// Start one worker. Must be called with the state lock held; the new
    /// thread blocks on that lock until the caller releases it.
    fn spawn_worker(self: &Arc<Self>, state: &mut PoolState) -> io::Result<WorkerId> {
        let id = state.next_id;
        let shared = Arc::clone(self);
        let worker = self
            .factory
            .new_thread(id, Box::new(move || shared.run_worker(id)))?;

        state.next_id += 1;
        tracing::debug!(
            pool = %self.name,
            worker = %worker.name(),
            daemon = worker.is_daemon(),
            priority = worker.priority(),
            "worker started"
        );
        state.workers.insert(id, worker);
        state.largest = state.largest.max(state.workers.len());
        Ok(id)
    }

    fn run_worker(self: Arc<Self>, id: WorkerId) {
        let mut first = self.lock_state().first_tasks.remove(&id);

        loop {
            let job = match first.take() {
                Some(job) => job,
                None => match self.next_job(id) {
                    Some(job) => job,
                    None => break,
                },
            };
            self.run_job(job);
        }
    }

    fn run_job(&self, job: Job) {
        self.active.fetch_add(1, Ordering::SeqCst);
        let result = panic::catch_unwind(AssertUnwindSafe(job));
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);

        if let Err(payload) = result {
            self.failed.fetch_add(1, Ordering::SeqCst);
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            tracing::error!(
                pool = %self.name,
                worker = %std::thread::current().name().unwrap_or("?"),
                panic = %message,
                "task panicked"
            );
        }
    }

    /// Block until an item is available. Returns None once this worker has
    /// left the worker set (shutdown, idle timeout, excess over max, or
    /// renewal).
    fn next_job(self: &Arc<Self>, id: WorkerId) -> Option<Job> {
        let mut state = self.lock_state();
        let idle_since = Instant::now();

        loop {
            if state.shutdown {
                state.workers.remove(&id);
                return None;
            }

            let now = Instant::now();

            if state.workers.len() > state.bounds.max {
                state.workers.remove(&id);
                // The wakeup that got us here may have been meant for an item.
                if !state.queue.is_empty() {
                    self.work_available.notify_one();
                }
                tracing::debug!(pool = %self.name, worker = id, "worker retired above max");
                return None;
            }

            if state.renewal_due(id, now) && self.renew(&mut state, id, now) {
                return None;
            }

            if let Some(job) = state.queue.poll() {
                self.space_available.notify_one();
                return Some(job);
            }

            let keep_alive_left = state
                .keep_alive
                .saturating_sub(now.saturating_duration_since(idle_since));
            let can_time_out = state.workers.len() > state.bounds.core;

            if can_time_out && keep_alive_left.is_zero() {
                state.workers.remove(&id);
                tracing::debug!(pool = %self.name, worker = id, "idle worker exiting");
                return None;
            }

            // Core workers never time out and just re-check every keep-alive.
            let mut wait = if can_time_out {
                keep_alive_left
            } else {
                state.keep_alive
            };
            if let Some(renewal) = state.renewal_wait(id, now) {
                wait = wait.min(renewal);
            }

            state.idle += 1;
            state = self
                .work_available
                .wait_timeout(state, wait.max(MIN_PARK))
                .unwrap_or_else(PoisonError::into_inner)
                .0;
            state.idle -= 1;
        }
    }

    /// Retire worker `id` and start its replacement. Returns false (and keeps
    /// the worker) if the replacement could not be started.
    fn renew(self: &Arc<Self>, state: &mut PoolState, id: WorkerId, now: Instant) -> bool {
        state.last_renewal = Some(now);

        let Some(old) = state.workers.remove(&id) else {
            return false;
        };

        match self.spawn_worker(state) {
            Ok(new_id) => {
                self.renewed.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(
                    pool = %self.name,
                    worker = %old.name(),
                    age_ms = old.age(now).as_millis() as u64,
                    replacement = new_id,
                    "worker renewed"
                );
                true
            }
            Err(e) => {
                tracing::warn!(
                    pool = %self.name,
                    worker = %old.name(),
                    error = %e,
                    "renewal replacement failed, keeping worker"
                );
                state.workers.insert(id, old);
                false
            }
        }
    }
}
