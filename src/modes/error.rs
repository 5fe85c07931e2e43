//! Build errors for mode construction.

use thiserror::Error;

/// Errors that can occur when building a mode.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("Mode name not specified. Call .name(name) before .build()")]
    MissingName,

    #[error("Handler {index} of mode '{mode}' has an empty switch name")]
    EmptySwitchName { mode: String, index: usize },

    #[error("Held handler for switch '{switch}' has a zero hold. Use .on() for immediate handlers")]
    ZeroHold { switch: String },
}
