//! Pending "held for N ms" obligations.

use super::handler::{BindingId, SwitchCondition};
use super::mode::ModeId;
use crate::core::{Switch, SwitchStore};
use std::time::Duration;

/// A held-level handler waiting for its hold time to elapse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Obligation {
    pub mode: ModeId,
    pub binding: BindingId,
    pub switch: String,
    pub condition: SwitchCondition,
    pub hold: Duration,
    pub created_at: Duration,
}

impl Obligation {
    /// Engine time at which the handler becomes due.
    pub fn deadline(&self) -> Duration {
        self.created_at + self.hold
    }
}

/// Tracks obligations, cancelling any whose switch leaves the level.
///
/// Each obligation fires at most once.
#[derive(Debug, Clone)]
pub struct TimedScheduler {
    pending: Vec<Obligation>,
    overrun_tolerance: Duration,
    overrun_reported: bool,
    overruns: u64,
}

impl TimedScheduler {
    /// Scheduler with nothing pending.
    pub fn new(overrun_tolerance: Duration) -> Self {
        Self {
            pending: Vec::new(),
            overrun_tolerance,
            overrun_reported: false,
            overruns: 0,
        }
    }

    /// Start a new obligation. An identical pending one keeps its deadline.
    pub fn register(&mut self, obligation: Obligation) {
        let duplicate = self
            .pending
            .iter()
            .any(|p| p.mode == obligation.mode && p.binding == obligation.binding);
        if !duplicate {
            self.pending.push(obligation);
        }
    }

    /// Drop obligations on `switch` whose level no longer holds.
    pub fn cancel_unsatisfied(&mut self, switch: &Switch) -> usize {
        let before = self.pending.len();
        self.pending
            .retain(|p| p.switch != switch.name() || p.condition.holds(switch));
        let cancelled = before - self.pending.len();
        if cancelled > 0 {
            log::debug!("cancelled {cancelled} held handler(s) on '{}'", switch.name());
        }
        cancelled
    }

    /// Drop every obligation belonging to `mode`.
    pub fn cancel_mode(&mut self, mode: ModeId) -> usize {
        let before = self.pending.len();
        self.pending.retain(|p| p.mode != mode);
        before - self.pending.len()
    }

    /// Remove and return obligations whose deadline has passed with the level
    /// still held, earliest deadline first.
    pub fn take_due(&mut self, now: Duration, switches: &SwitchStore) -> Vec<Obligation> {
        let mut due = Vec::new();
        let mut kept = Vec::with_capacity(self.pending.len());

        for obligation in self.pending.drain(..) {
            let holds = switches
                .get(&obligation.switch)
                .is_some_and(|switch| obligation.condition.holds(switch));
            if !holds {
                continue;
            }
            if now >= obligation.deadline() {
                due.push(obligation);
            } else {
                kept.push(obligation);
            }
        }
        self.pending = kept;

        due.sort_by_key(Obligation::deadline);
        for obligation in &due {
            self.note_lateness(now, obligation);
        }
        due
    }

    fn note_lateness(&mut self, now: Duration, obligation: &Obligation) {
        let late = now.saturating_sub(obligation.deadline());
        if late <= self.overrun_tolerance {
            return;
        }
        self.overruns += 1;
        if self.overrun_reported {
            log::debug!(
                "held handler on '{}' fired {}ms late",
                obligation.switch,
                late.as_millis()
            );
        } else {
            self.overrun_reported = true;
            log::warn!(
                "held handler on '{}' fired {}ms late; the run loop is overrunning",
                obligation.switch,
                late.as_millis()
            );
        }
    }

    /// Obligations not yet due, in registration order.
    pub fn pending(&self) -> &[Obligation] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// How many obligations fired later than the overrun tolerance.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }
}
