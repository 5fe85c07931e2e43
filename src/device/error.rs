//! Device boundary failures.

use thiserror::Error;

/// A call across the device boundary failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceFault {
    #[error("device did not respond to {operation}")]
    Unresponsive { operation: &'static str },

    #[error("device rejected {operation}: {reason}")]
    Rejected {
        operation: &'static str,
        reason: String,
    },

    #[error("device is closed")]
    Closed,
}
