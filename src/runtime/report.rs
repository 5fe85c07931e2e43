//! What a finished run loop reports back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why the run loop stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopExit {
    /// The stop handle was triggered.
    Cancelled,
    /// The device failed; the message is the fault.
    DeviceFault(String),
    /// An iteration panicked outside any mode callback.
    Panicked(String),
    /// The machine had already been closed by an earlier run.
    AlreadyClosed,
}

impl LoopExit {
    /// Whether the loop ended on request rather than by failure.
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Summary of one call to [`Machine::run`](super::Machine::run).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopReport {
    pub iterations: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub exit: LoopExit,
}

impl LoopReport {
    pub fn elapsed(&self) -> chrono::Duration {
        self.ended_at - self.started_at
    }
}

/// Running counters kept by the machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineStats {
    pub iterations: u64,
    /// Switch events received, duplicates included.
    pub switch_events: u64,
    /// Switch events that matched the stored level and were dropped.
    pub duplicate_events: u64,
    pub dispatches: u64,
    pub frames: u64,
    pub handler_faults: u64,
    pub deferred_commands: u64,
}
