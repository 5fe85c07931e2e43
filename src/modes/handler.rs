//! Switch handler bindings and their outcomes.

use crate::core::{DriverError, Switch};
use crate::device::DeviceFault;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Which level of a switch a handler reacts to.
///
/// `Active`/`Inactive` follow the switch wiring; `Open`/`Closed` are the raw
/// electrical level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwitchCondition {
    Active,
    Inactive,
    Open,
    Closed,
}

impl SwitchCondition {
    /// Whether `switch` currently sits at this level.
    pub fn holds(self, switch: &Switch) -> bool {
        match self {
            Self::Active => switch.is_active(),
            Self::Inactive => switch.is_inactive(),
            Self::Open => switch.is_open(),
            Self::Closed => switch.is_closed(),
        }
    }
}

/// Whether a transition keeps travelling down the mode stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// Let lower-priority modes see the transition.
    Continue,
    /// The transition is fully handled.
    Stop,
}

impl From<bool> for SwitchOutcome {
    fn from(continue_propagation: bool) -> Self {
        if continue_propagation {
            Self::Continue
        } else {
            Self::Stop
        }
    }
}

/// Error returned from a mode callback.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandlerError {
    /// The board failed. Escalates to run loop shutdown.
    #[error(transparent)]
    Device(#[from] DeviceFault),

    #[error("no driver named '{0}'")]
    UnknownDriver(String),

    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

impl From<DriverError> for HandlerError {
    fn from(error: DriverError) -> Self {
        match error {
            DriverError::Unknown(name) => Self::UnknownDriver(name),
            DriverError::Device(fault) => Self::Device(fault),
            other @ DriverError::NotVirtual(_) => Self::Failed(other.to_string()),
        }
    }
}

pub type HandlerResult = Result<SwitchOutcome, HandlerError>;

/// Index of a handler inside its mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingId(pub(crate) usize);

/// One registered (switch, condition, hold) → handler entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub id: BindingId,
    pub switch: String,
    pub condition: SwitchCondition,
    /// Fire only after the level has been held this long.
    pub hold: Option<Duration>,
}

/// Why a callback was abandoned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FaultReason {
    #[error(transparent)]
    Error(#[from] HandlerError),

    #[error("panicked: {0}")]
    Panicked(String),
}

/// A mode callback failed; dispatch carried on without it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("mode '{mode}' faulted {}: {reason}", describe(.switch))]
pub struct HandlerFault {
    pub mode: String,
    /// Switch being handled, `None` for lifecycle hooks.
    pub switch: Option<String>,
    pub reason: FaultReason,
}

fn describe(switch: &Option<String>) -> String {
    match switch {
        Some(name) => format!("handling switch '{name}'"),
        None => "in a lifecycle hook".to_string(),
    }
}

impl HandlerFault {
    /// The device fault behind this fault, if any.
    pub fn device_fault(&self) -> Option<&DeviceFault> {
        match &self.reason {
            FaultReason::Error(HandlerError::Device(fault)) => Some(fault),
            _ => None,
        }
    }
}
