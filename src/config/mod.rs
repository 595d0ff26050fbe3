//! Configuration module for elastic_executor.
//!
//! Pool parameters and logging settings are loaded from environment
//! variables. Library users can also build an [`ExecutorConfig`] directly.
//!
//! # Example
//!
//! ```rust,ignore
//! use elastic_executor::config::Config;
//!
//! let config = Config::from_env()?;
//! println!("Max threads: {}", config.executor.max_threads);
//! ```

mod error;
mod executor;
mod logging;
mod parse;

pub use error::ConfigError;
pub use executor::{
    validate_bounds, ExecutorConfig, DEFAULT_THREAD_RENEWAL_DELAY, MAX_PRIORITY, MIN_PRIORITY,
    NORM_PRIORITY,
};
pub use logging::{LogFormat, LoggingConfig};
pub use parse::{env_parse, parse_duration};

/// Complete application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Executor configuration.
    pub executor: ExecutorConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            executor: ExecutorConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Print configuration summary to log.
    pub fn log_summary(&self) {
        use tracing::info;

        let executor = &self.executor;
        info!("Configuration loaded:");
        info!("  Executor: {}", executor.name);
        info!(
            "  Threads: {} spare / {} max",
            executor.min_spare_threads, executor.max_threads
        );
        info!("  Max idle time: {:?}", executor.max_idle_time);

        match executor.max_queue_size {
            Some(size) => info!("  Queue capacity: {}", size),
            None => info!("  Queue capacity: unbounded"),
        }

        match executor.thread_renewal_delay {
            Some(delay) => info!("  Thread renewal delay: {:?}", delay),
            None => info!("  Thread renewal: disabled"),
        }

        if executor.prestart_min_spare_threads {
            info!("  Prestart: enabled");
        }
    }
}
