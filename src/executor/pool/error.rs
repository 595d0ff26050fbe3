//! Worker pool error types.

use std::fmt;
use std::time::Duration;

use crate::config::ConfigError;
use crate::executor::lifecycle::LifecycleState;

/// Why an admission was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Queue at capacity and no worker exists to force the item onto.
    QueueFull,
    /// A timed submission waited this long without being admitted.
    DeadlineElapsed(Duration),
}

/// Errors that can occur during pool operations.
#[derive(Debug, Clone)]
pub enum PoolError {
    /// The operation is not legal in the current lifecycle state.
    IllegalState {
        expected: LifecycleState,
        actual: LifecycleState,
    },

    /// The pool is saturated.
    Rejected {
        /// Pool name.
        pool: String,
        reason: RejectReason,
        /// Items queued at the time of rejection.
        queued: usize,
        /// Nominal queue capacity (None = unbounded).
        capacity: Option<usize>,
    },

    /// Bounds violation detected while configuring.
    ConfigurationInvalid(ConfigError),

    /// The OS refused to create a worker thread.
    Spawn(String),
}

impl PoolError {
    /// Check if this is an admission rejection.
    pub fn is_rejected(&self) -> bool {
        matches!(self, PoolError::Rejected { .. })
    }

    /// Check if this is a lifecycle violation.
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, PoolError::IllegalState { .. })
    }

    /// Check if this is a configuration error.
    pub fn is_configuration_invalid(&self) -> bool {
        matches!(self, PoolError::ConfigurationInvalid(_))
    }

    /// Rejection reason, if this is a rejection.
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            PoolError::Rejected { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    pub(crate) fn not_started(actual: LifecycleState) -> Self {
        PoolError::IllegalState {
            expected: LifecycleState::Started,
            actual,
        }
    }
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::IllegalState { expected, actual } => {
                write!(f, "executor is {}, expected {}", actual, expected)
            }
            PoolError::Rejected {
                pool,
                reason,
                queued,
                capacity,
            } => {
                let capacity = match capacity {
                    Some(c) => c.to_string(),
                    None => "unbounded".to_string(),
                };
                match reason {
                    RejectReason::QueueFull => write!(
                        f,
                        "executor '{}' saturated: queue full ({}/{}) and no worker available",
                        pool, queued, capacity
                    ),
                    RejectReason::DeadlineElapsed(waited) => write!(
                        f,
                        "executor '{}' saturated: not admitted within {}ms ({}/{} queued)",
                        pool,
                        waited.as_millis(),
                        queued,
                        capacity
                    ),
                }
            }
            PoolError::ConfigurationInvalid(e) => write!(f, "invalid configuration: {}", e),
            PoolError::Spawn(msg) => write!(f, "failed to spawn worker thread: {}", msg),
        }
    }
}

impl std::error::Error for PoolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PoolError::ConfigurationInvalid(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for PoolError {
    fn from(e: ConfigError) -> Self {
        PoolError::ConfigurationInvalid(e)
    }
}

/// Result type alias for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;
