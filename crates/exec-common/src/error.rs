use thiserror::Error;

/// Executive error types covering configuration, timer setup, and lifecycle faults.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExecError {
    /// Configuration or initialization error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Interval timer could not be armed or serviced. Fatal at startup: the
    /// executive cannot meet its real-time contract without its clock.
    #[error("timer error: {0}")]
    Timer(String),

    /// GPIO capability error (pin configuration during startup).
    #[error("gpio error: {0}")]
    Gpio(String),

    /// Generic runtime fault.
    #[error("runtime fault: {0}")]
    Fault(String),

    /// Invalid state transition attempted.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Source state.
        from: String,
        /// Attempted target state.
        to: String,
    },
}

/// Convenience type alias for executive operations.
pub type ExecResult<T> = Result<T, ExecError>;
