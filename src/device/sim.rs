//! In-memory control board for bench runs and tests.

use super::{Device, DeviceFault, DriverAction, DriverDirective, RuleOptions, RuleTrigger};
use crate::core::{Event, EventKind};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A rule as currently stored on the simulated board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledRule {
    pub options: RuleOptions,
    pub directives: Vec<DriverDirective>,
}

/// Driver output requested directly by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverCall {
    Pulse { driver: u16, ms: u8 },
    Disable { driver: u16 },
    Pattern {
        driver: u16,
        on_ms: u8,
        off_ms: u8,
        original_on_ms: u8,
    },
}

#[derive(Debug, Default)]
struct SimState {
    pending: VecDeque<Event>,
    frame_events_per_poll: usize,
    rules: HashMap<(u16, RuleTrigger), InstalledRule>,
    rule_writes: usize,
    calls: Vec<DriverCall>,
    watchdog_tickles: u64,
    close_count: u32,
    closed: bool,
    injected_fault: Option<DeviceFault>,
}

/// Simulated board. Clones share state, so a test can keep a handle while
/// the machine owns the device.
#[derive(Debug, Clone, Default)]
pub struct SimulatedDevice {
    inner: Arc<Mutex<SimState>>,
}

impl SimulatedDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit `count` frame-displayed events on every poll that asks for them.
    pub fn with_frame_events(self, count: usize) -> Self {
        self.state().frame_events_per_poll = count;
        self
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a switch event as the board would report it.
    pub fn add_switch_event(&self, number: u16, kind: EventKind) {
        self.state().pending.push_back(Event { kind, value: number });
    }

    pub fn add_event(&self, event: Event) {
        self.state().pending.push_back(event);
    }

    /// Make the next fallible call fail with `fault`.
    pub fn inject_fault(&self, fault: DeviceFault) {
        self.state().injected_fault = Some(fault);
    }

    pub fn installed_rule(&self, switch: u16, trigger: RuleTrigger) -> Option<InstalledRule> {
        self.state().rules.get(&(switch, trigger)).cloned()
    }

    pub fn installed_rules(&self) -> HashMap<(u16, RuleTrigger), InstalledRule> {
        self.state().rules.clone()
    }

    /// Number of rule install calls received, including removals.
    pub fn rule_writes(&self) -> usize {
        self.state().rule_writes
    }

    pub fn driver_calls(&self) -> Vec<DriverCall> {
        self.state().calls.clone()
    }

    pub fn clear_driver_calls(&self) {
        self.state().calls.clear();
    }

    pub fn watchdog_tickles(&self) -> u64 {
        self.state().watchdog_tickles
    }

    pub fn close_count(&self) -> u32 {
        self.state().close_count
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }
}

impl SimState {
    fn check(&mut self) -> Result<(), DeviceFault> {
        if let Some(fault) = self.injected_fault.take() {
            return Err(fault);
        }
        if self.closed {
            return Err(DeviceFault::Closed);
        }
        Ok(())
    }

    fn drive(&mut self, directive: &DriverDirective) {
        let call = match directive.action {
            DriverAction::Pulse { ms } => DriverCall::Pulse {
                driver: directive.driver,
                ms,
            },
            DriverAction::Disable => DriverCall::Disable {
                driver: directive.driver,
            },
            DriverAction::Patter {
                on_ms,
                off_ms,
                original_on_ms,
            } => DriverCall::Pattern {
                driver: directive.driver,
                on_ms,
                off_ms,
                original_on_ms,
            },
        };
        self.calls.push(call);
    }
}

impl Device for SimulatedDevice {
    fn get_events(&mut self, include_frame_events: bool) -> Result<Vec<Event>, DeviceFault> {
        let mut state = self.state();
        state.check()?;

        let mut events: Vec<Event> = state.pending.drain(..).collect();
        if include_frame_events {
            let frames = state.frame_events_per_poll;
            events.extend(std::iter::repeat(Event::frame_displayed()).take(frames));
        }
        Ok(events)
    }

    fn install_switch_rule(
        &mut self,
        switch: u16,
        trigger: RuleTrigger,
        options: RuleOptions,
        directives: &[DriverDirective],
        drive_outputs_now: bool,
    ) -> Result<(), DeviceFault> {
        let mut state = self.state();
        state.check()?;
        state.rule_writes += 1;

        if directives.is_empty() {
            state.rules.remove(&(switch, trigger));
            return Ok(());
        }

        if drive_outputs_now {
            for directive in directives {
                state.drive(directive);
            }
        }
        state.rules.insert(
            (switch, trigger),
            InstalledRule {
                options,
                directives: directives.to_vec(),
            },
        );
        Ok(())
    }

    fn pulse(&mut self, driver: u16, ms: u8) -> Result<(), DeviceFault> {
        let mut state = self.state();
        state.check()?;
        state.calls.push(DriverCall::Pulse { driver, ms });
        Ok(())
    }

    fn disable(&mut self, driver: u16) -> Result<(), DeviceFault> {
        let mut state = self.state();
        state.check()?;
        state.calls.push(DriverCall::Disable { driver });
        Ok(())
    }

    fn pattern(
        &mut self,
        driver: u16,
        on_ms: u8,
        off_ms: u8,
        original_on_ms: u8,
    ) -> Result<(), DeviceFault> {
        let mut state = self.state();
        state.check()?;
        state.calls.push(DriverCall::Pattern {
            driver,
            on_ms,
            off_ms,
            original_on_ms,
        });
        Ok(())
    }

    fn tickle_watchdog(&mut self) -> Result<(), DeviceFault> {
        let mut state = self.state();
        state.check()?;
        state.watchdog_tickles += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), DeviceFault> {
        let mut state = self.state();
        state.close_count += 1;
        state.closed = true;
        Ok(())
    }
}
