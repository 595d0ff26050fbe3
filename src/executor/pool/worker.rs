//! Worker records and the thread factory that creates them.

use std::io;
use std::thread::{self, JoinHandle, Thread};
use std::time::{Duration, Instant};

use crate::config::{ExecutorConfig, NORM_PRIORITY};

/// Worker identity, unique within one pool instance.
pub type WorkerId = u64;

/// Body executed on a freshly spawned worker thread.
pub type WorkerBody = Box<dyn FnOnce() + Send + 'static>;

/// One worker thread as seen by the pool.
#[derive(Debug)]
pub struct Worker {
    id: WorkerId,
    daemon: bool,
    priority: u8,
    created_at: Instant,
    handle: JoinHandle<()>,
}

impl Worker {
    pub fn new(id: WorkerId, daemon: bool, priority: u8, handle: JoinHandle<()>) -> Self {
        Self {
            id,
            daemon,
            priority,
            created_at: Instant::now(),
            handle,
        }
    }

    #[inline]
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Thread name, empty if the factory did not set one.
    pub fn name(&self) -> &str {
        self.thread().name().unwrap_or("")
    }

    pub fn thread(&self) -> &Thread {
        self.handle.thread()
    }

    #[inline]
    pub fn is_daemon(&self) -> bool {
        self.daemon
    }

    #[inline]
    pub fn priority(&self) -> u8 {
        self.priority
    }

    #[inline]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }
}

/// Creates worker threads for a pool.
///
/// The pool calls this with its lock held; the body must not be run inline.
pub trait ThreadFactory: Send + Sync + 'static {
    fn new_thread(&self, id: WorkerId, body: WorkerBody) -> io::Result<Worker>;
}

impl ThreadFactory for Box<dyn ThreadFactory> {
    fn new_thread(&self, id: WorkerId, body: WorkerBody) -> io::Result<Worker> {
        (**self).new_thread(id, body)
    }
}

/// Default factory: named threads `"{prefix}{id}"` with the configured
/// daemon and priority hints.
#[derive(Debug, Clone)]
pub struct TaskThreadFactory {
    name_prefix: String,
    daemon: bool,
    priority: u8,
}

impl TaskThreadFactory {
    pub fn new(name_prefix: impl Into<String>, daemon: bool, priority: u8) -> Self {
        Self {
            name_prefix: name_prefix.into(),
            daemon,
            priority,
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(
            config.name_prefix.clone(),
            config.daemon,
            config.thread_priority,
        )
    }

    pub fn name_prefix(&self) -> &str {
        &self.name_prefix
    }
}

impl ThreadFactory for TaskThreadFactory {
    fn new_thread(&self, id: WorkerId, body: WorkerBody) -> io::Result<Worker> {
        let priority = self.priority;
        let handle = thread::Builder::new()
            .name(format!("{}{}", self.name_prefix, id))
            .spawn(move || {
                apply_priority(priority);
                body();
            })?;

        Ok(Worker::new(id, self.daemon, priority, handle))
    }
}

/// Map a 1..=10 priority onto a nice value (5 -> 0, 1 -> 8, 10 -> -10).
pub fn nice_for(priority: u8) -> i32 {
    (NORM_PRIORITY as i32 - priority as i32) * 2
}

/// Apply the priority hint to the calling thread.
#[cfg(target_os = "linux")]
fn apply_priority(priority: u8) {
    if priority == NORM_PRIORITY {
        return;
    }

    let nice = nice_for(priority);
    // SAFETY: gettid has no preconditions; setpriority with a tid only
    // affects the calling thread.
    let rc = unsafe {
        let tid = libc::syscall(libc::SYS_gettid) as libc::id_t;
        libc::setpriority(libc::PRIO_PROCESS, tid, nice)
    };

    if rc != 0 {
        // Raising priority needs CAP_SYS_NICE; run at default instead.
        tracing::debug!(
            priority,
            nice,
            error = %io::Error::last_os_error(),
            "thread priority not applied"
        );
    }
}

#[cfg(not(target_os = "linux"))]
fn apply_priority(_priority: u8) {}
