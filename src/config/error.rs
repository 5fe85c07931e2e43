//! Machine bring-up errors.

use thiserror::Error;

/// One problem found in a machine configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("switch '{name}' referenced by {referenced_by} is not configured")]
    MissingSwitch { name: String, referenced_by: String },

    #[error("driver '{name}' referenced by {referenced_by} is not configured")]
    MissingDriver { name: String, referenced_by: String },

    #[error("{kind} name '{name}' is configured more than once")]
    DuplicateName { kind: &'static str, name: String },

    #[error("{kind} number {number} is configured more than once")]
    DuplicateNumber { kind: &'static str, number: u16 },

    #[error("{kind} number {number} has an empty name")]
    EmptyName { kind: &'static str, number: u16 },

    #[error("bumper coil '{name}' needs a pulse length; zero would hold it on")]
    ZeroBumperPulse { name: String },

    #[error("number of balls installed must be greater than zero")]
    NoBalls,

    #[error("balls per game must be greater than zero")]
    NoBallsPerGame,

    #[error("invalid configuration document: {0}")]
    Parse(String),
}

/// Every problem found in one validation pass. Bring-up refuses to start
/// while any remain.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("machine configuration rejected with {} problem(s): {}", .0.len(), join(.0))]
pub struct ConfigurationErrors(pub Vec<ConfigurationError>);

impl ConfigurationErrors {
    pub fn iter(&self) -> std::slice::Iter<'_, ConfigurationError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<ConfigurationError> for ConfigurationErrors {
    fn from(error: ConfigurationError) -> Self {
        Self(vec![error])
    }
}

fn join(errors: &[ConfigurationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
