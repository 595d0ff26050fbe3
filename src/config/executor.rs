//! Executor configuration.

use super::parse::{env_bool, env_duration, env_opt, env_or, env_parse};
use super::ConfigError;
use std::num::NonZeroUsize;
use std::time::Duration;

/// Lowest accepted thread priority.
pub const MIN_PRIORITY: u8 = 1;
/// Priority assigned when none is configured.
pub const NORM_PRIORITY: u8 = 5;
/// Highest accepted thread priority.
pub const MAX_PRIORITY: u8 = 10;

/// Delay observed between two worker renewals when nothing else is set.
pub const DEFAULT_THREAD_RENEWAL_DELAY: Duration = Duration::from_millis(1000);

/// Pool parameters for a [`StandardExecutor`](crate::executor::StandardExecutor).
///
/// Values are plain data; [`validate`](Self::validate) enforces the bounds
/// and is called by every entry point that accepts a config.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Executor name, used in logs and rejection errors.
    pub name: String,
    /// Core worker count kept alive while idle.
    pub min_spare_threads: usize,
    /// Upper bound on live workers.
    pub max_threads: usize,
    /// How long a worker above the core count may sit idle before exiting.
    pub max_idle_time: Duration,
    /// Nominal queue capacity (None = unbounded).
    pub max_queue_size: Option<NonZeroUsize>,
    /// Prefix for worker thread names.
    pub name_prefix: String,
    /// Daemon hint recorded on every worker.
    pub daemon: bool,
    /// Scheduling priority hint (1..=10, 5 is normal).
    pub thread_priority: u8,
    /// Worker age after which it is renewed, also the minimum gap between
    /// two renewals. None disables renewal.
    pub thread_renewal_delay: Option<Duration>,
    /// Spawn `min_spare_threads` workers during start instead of lazily.
    pub prestart_min_spare_threads: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            name: "executor".to_string(),
            min_spare_threads: 25,
            max_threads: 200,
            max_idle_time: Duration::from_secs(60),
            max_queue_size: None,
            name_prefix: "exec-".to_string(),
            daemon: true,
            thread_priority: NORM_PRIORITY,
            thread_renewal_delay: Some(DEFAULT_THREAD_RENEWAL_DELAY),
            prestart_min_spare_threads: false,
        }
    }
}

impl ExecutorConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let max_threads = match env_parse("EXECUTOR_MAX_THREADS", defaults.max_threads)? {
            0 => num_cpus::get(),
            n => n,
        };

        let max_idle_time = env_duration("EXECUTOR_MAX_IDLE_TIME", "60s")?.ok_or_else(|| {
            ConfigError::invalid("EXECUTOR_MAX_IDLE_TIME", "idle time cannot be disabled")
        })?;

        let config = Self {
            name: env_or("EXECUTOR_NAME", &defaults.name),
            min_spare_threads: env_parse("EXECUTOR_MIN_SPARE_THREADS", defaults.min_spare_threads)?,
            max_threads,
            max_idle_time,
            max_queue_size: NonZeroUsize::new(env_parse("EXECUTOR_MAX_QUEUE_SIZE", 0usize)?),
            name_prefix: env_opt("EXECUTOR_NAME_PREFIX").unwrap_or(defaults.name_prefix),
            daemon: env_bool("EXECUTOR_DAEMON", defaults.daemon),
            thread_priority: env_parse("EXECUTOR_THREAD_PRIORITY", defaults.thread_priority)?,
            thread_renewal_delay: env_duration("EXECUTOR_THREAD_RENEWAL_DELAY", "1000ms")?,
            prestart_min_spare_threads: env_bool("EXECUTOR_PRESTART", false),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set core and maximum worker counts together.
    pub fn with_threads(mut self, min_spare_threads: usize, max_threads: usize) -> Self {
        self.min_spare_threads = min_spare_threads;
        self.max_threads = max_threads;
        self
    }

    pub fn with_max_idle_time(mut self, idle: Duration) -> Self {
        self.max_idle_time = idle;
        self
    }

    /// Bound the queue; 0 means unbounded.
    pub fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = NonZeroUsize::new(size);
        self
    }

    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    pub fn with_daemon(mut self, daemon: bool) -> Self {
        self.daemon = daemon;
        self
    }

    pub fn with_thread_priority(mut self, priority: u8) -> Self {
        self.thread_priority = priority;
        self
    }

    pub fn with_thread_renewal_delay(mut self, delay: Option<Duration>) -> Self {
        self.thread_renewal_delay = delay;
        self
    }

    pub fn with_prestart(mut self, prestart: bool) -> Self {
        self.prestart_min_spare_threads = prestart;
        self
    }

    /// Check bound invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_bounds(self.min_spare_threads, self.max_threads)?;

        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&self.thread_priority) {
            return Err(ConfigError::invalid(
                "thread_priority",
                format!(
                    "{} is outside {}..={}",
                    self.thread_priority, MIN_PRIORITY, MAX_PRIORITY
                ),
            ));
        }
        if self.max_idle_time.is_zero() {
            return Err(ConfigError::invalid(
                "max_idle_time",
                "idle time must be greater than zero",
            ));
        }
        if self.thread_renewal_delay.is_some_and(|d| d.is_zero()) {
            return Err(ConfigError::invalid(
                "thread_renewal_delay",
                "use None to disable renewal",
            ));
        }
        if self.name_prefix.is_empty() {
            return Err(ConfigError::invalid(
                "name_prefix",
                "thread name prefix cannot be empty",
            ));
        }
        if self.name_prefix.contains('\0') {
            return Err(ConfigError::invalid(
                "name_prefix",
                "thread name prefix cannot contain null bytes",
            ));
        }
        Ok(())
    }
}

/// Check a `(min, max)` worker pair.
pub fn validate_bounds(min: usize, max: usize) -> Result<(), ConfigError> {
    if max == 0 {
        return Err(ConfigError::invalid(
            "max_threads",
            "maximum thread count must be at least 1",
        ));
    }
    if min > max {
        return Err(ConfigError::invalid(
            "min_spare_threads",
            format!("{} exceeds max_threads {}", min, max),
        ));
    }
    Ok(())
}
