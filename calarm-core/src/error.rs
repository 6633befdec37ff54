//! Error types for calarm.

use thiserror::Error;

/// Errors that can occur in calarm operations.
#[derive(Error, Debug)]
pub enum CalarmError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    #[error("Calendar store error: {0}")]
    Store(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The backend does not support the requested capability; callers may fall back.
    #[error("Unsupported by server: {0}")]
    Unsupported(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("ICS parse error: {0}")]
    IcsParse(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("No alarm is being presented")]
    NotPresenting,

    #[error("A snooze is already in progress")]
    SnoozeInFlight,

    #[error("Alarm monitor has shut down")]
    MonitorClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for calarm operations.
pub type CalarmResult<T> = Result<T, CalarmError>;
