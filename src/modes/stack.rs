//! The priority-ordered mode stack and switch dispatch.

use super::context::ModeContext;
use super::handler::{FaultReason, HandlerError, HandlerFault, SwitchOutcome};
use super::mode::{Mode, ModeHooks, ModeId, StackedMode};
use super::timed::{Obligation, TimedScheduler};
use crate::core::Switch;
use crate::device::DeviceFault;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

struct Slot {
    seq: u64,
    mode: Box<dyn StackedMode>,
}

/// What happened during one dispatch or tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Immediate handlers called.
    pub invoked: usize,
    /// Held handlers that started waiting.
    pub scheduled: usize,
    /// Held handlers that fired.
    pub fired: usize,
    /// Mode that stopped propagation.
    pub stopped_by: Option<ModeId>,
    pub faults: Vec<HandlerFault>,
}

impl DispatchReport {
    /// The first device fault raised by a callback.
    pub fn device_fault(&self) -> Option<&DeviceFault> {
        self.faults.iter().find_map(HandlerFault::device_fault)
    }

    /// `Err` if any callback hit a device fault.
    pub fn into_result(self) -> Result<Self, DeviceFault> {
        match self.device_fault().cloned() {
            Some(fault) => Err(fault),
            None => Ok(self),
        }
    }
}

/// Live modes, highest priority first; equal priorities in insertion order.
pub struct ModeStack {
    slots: Vec<Slot>,
    next_seq: u64,
    timers: TimedScheduler,
    fault_count: u64,
}

impl ModeStack {
    /// Empty stack; held handlers later than `overrun_tolerance` are reported.
    pub fn new(overrun_tolerance: Duration) -> Self {
        Self {
            slots: Vec::new(),
            next_seq: 0,
            timers: TimedScheduler::new(overrun_tolerance),
            fault_count: 0,
        }
    }

    /// Insert `mode` and run its start hook.
    ///
    /// A mode already on the stack is left where it is.
    pub fn add(
        &mut self,
        mode: Box<dyn StackedMode>,
        ctx: &mut ModeContext<'_>,
    ) -> Result<ModeId, DeviceFault> {
        let id = mode.id();
        if self.contains(id) {
            log::debug!("mode '{}' ({id}) is already on the stack", mode.name());
            return Ok(id);
        }

        let priority = mode.priority();
        let position = self
            .slots
            .iter()
            .position(|slot| slot.mode.priority() < priority)
            .unwrap_or(self.slots.len());
        let seq = self.next_seq;
        self.next_seq += 1;
        log::debug!("adding mode '{}' at priority {priority}", mode.name());
        self.slots.insert(position, Slot { seq, mode });

        let slot = &mut self.slots[position];
        let outcome = Self::guarded(slot.mode.as_mut(), ctx, |mode, ctx| mode.started(ctx));
        self.settle_hook(outcome)?;
        Ok(id)
    }

    /// Remove a mode, cancel its held handlers and run its stop hook.
    ///
    /// Returns `Ok(false)` if the mode was not on the stack.
    pub fn remove(&mut self, id: ModeId, ctx: &mut ModeContext<'_>) -> Result<bool, DeviceFault> {
        let Some(position) = self.slots.iter().position(|slot| slot.mode.id() == id) else {
            return Ok(false);
        };
        let mut slot = self.slots.remove(position);
        self.timers.cancel_mode(id);
        log::debug!("removing mode '{}'", slot.mode.name());

        let outcome = Self::guarded(slot.mode.as_mut(), ctx, |mode, ctx| mode.stopped(ctx));
        self.settle_hook(outcome)?;
        Ok(true)
    }

    /// Remove every mode, highest priority first.
    pub fn clear(&mut self, ctx: &mut ModeContext<'_>) -> Result<(), DeviceFault> {
        let mut first_fault = None;
        for id in self.ids() {
            if let Err(fault) = self.remove(id, ctx) {
                first_fault.get_or_insert(fault);
            }
        }
        first_fault.map_or(Ok(()), Err)
    }

    /// Walk the stack for a switch that just changed level.
    ///
    /// Every matching immediate handler of a mode runs in registration order;
    /// if any of them returns [`SwitchOutcome::Stop`] lower modes are skipped.
    /// Matching held handlers start waiting instead. Faulting callbacks are
    /// logged and the walk carries on.
    pub fn dispatch(&mut self, switch: &Switch, ctx: &mut ModeContext<'_>) -> DispatchReport {
        self.timers.cancel_unsatisfied(switch);

        let mut report = DispatchReport::default();
        let now = ctx.now();

        for slot in self.slots.iter_mut() {
            let mode_id = slot.mode.id();
            let matching: Vec<_> = slot
                .mode
                .bindings(switch.name())
                .iter()
                .filter(|binding| binding.condition.holds(switch))
                .map(|binding| (binding.id, binding.condition, binding.hold))
                .collect();

            let mut stop = false;
            for (binding, condition, hold) in matching {
                if let Some(hold) = hold {
                    self.timers.register(Obligation {
                        mode: mode_id,
                        binding,
                        switch: switch.name().to_string(),
                        condition,
                        hold,
                        created_at: now,
                    });
                    report.scheduled += 1;
                    continue;
                }

                report.invoked += 1;
                let outcome = Self::guarded(slot.mode.as_mut(), ctx, |mode, ctx| {
                    mode.invoke(binding, switch, ctx)
                });
                match outcome {
                    Ok(SwitchOutcome::Stop) => stop = true,
                    Ok(SwitchOutcome::Continue) => {}
                    Err(reason) => {
                        let fault = HandlerFault {
                            mode: slot.mode.name().to_string(),
                            switch: Some(switch.name().to_string()),
                            reason,
                        };
                        log::error!("{fault}");
                        self.fault_count += 1;
                        report.faults.push(fault);
                    }
                }
            }

            if stop {
                log::trace!("'{}' stopped by mode '{}'", switch.name(), slot.mode.name());
                report.stopped_by = Some(mode_id);
                break;
            }
        }

        report
    }

    /// Tick every live mode, then fire held handlers that have come due.
    pub fn tick(&mut self, ctx: &mut ModeContext<'_>) -> DispatchReport {
        let mut report = DispatchReport::default();

        for slot in self.slots.iter_mut() {
            if let Err(reason) = Self::guarded(slot.mode.as_mut(), ctx, |mode, ctx| mode.tick(ctx)) {
                let fault = HandlerFault {
                    mode: slot.mode.name().to_string(),
                    switch: None,
                    reason,
                };
                log::error!("{fault}");
                self.fault_count += 1;
                report.faults.push(fault);
            }
        }

        let switches = ctx.switches();
        for obligation in self.timers.take_due(ctx.now(), switches) {
            let Some(switch) = switches.get(&obligation.switch) else {
                continue;
            };
            let Some(slot) = self.slots.iter_mut().find(|slot| slot.mode.id() == obligation.mode)
            else {
                continue;
            };

            report.fired += 1;
            let binding = obligation.binding;
            let outcome = Self::guarded(slot.mode.as_mut(), ctx, |mode, ctx| {
                mode.invoke(binding, switch, ctx)
            });
            if let Err(reason) = outcome {
                let fault = HandlerFault {
                    mode: slot.mode.name().to_string(),
                    switch: Some(obligation.switch.clone()),
                    reason,
                };
                log::error!("{fault}");
                self.fault_count += 1;
                report.faults.push(fault);
            }
        }

        report
    }

    /// Run `call` as `mode`, turning errors and panics into a [`FaultReason`].
    fn guarded<T>(
        mode: &mut dyn StackedMode,
        ctx: &mut ModeContext<'_>,
        call: impl FnOnce(&mut dyn StackedMode, &mut ModeContext<'_>) -> Result<T, HandlerError>,
    ) -> Result<T, FaultReason> {
        let previous = ctx.set_mode(Some(mode.id()));
        let result = panic::catch_unwind(AssertUnwindSafe(|| call(&mut *mode, &mut *ctx)));
        ctx.set_mode(previous);

        match result {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(FaultReason::Error(error)),
            Err(payload) => Err(FaultReason::Panicked(panic_message(payload.as_ref()))),
        }
    }

    fn settle_hook(&mut self, outcome: Result<(), FaultReason>) -> Result<(), DeviceFault> {
        match outcome {
            Ok(()) => Ok(()),
            Err(FaultReason::Error(HandlerError::Device(fault))) => Err(fault),
            Err(reason) => {
                log::error!("mode lifecycle hook faulted: {reason}");
                self.fault_count += 1;
                Ok(())
            }
        }
    }

    /// Whether the mode with `id` is live.
    pub fn contains(&self, id: ModeId) -> bool {
        self.slots.iter().any(|slot| slot.mode.id() == id)
    }

    /// Whether any live mode is called `name`.
    pub fn contains_name(&self, name: &str) -> bool {
        self.slots.iter().any(|slot| slot.mode.name() == name)
    }

    /// Mode ids in dispatch order.
    pub fn ids(&self) -> Vec<ModeId> {
        self.slots.iter().map(|slot| slot.mode.id()).collect()
    }

    /// `(name, priority)` pairs in dispatch order.
    pub fn names(&self) -> Vec<(&str, i32)> {
        self.slots
            .iter()
            .map(|slot| (slot.mode.name(), slot.mode.priority()))
            .collect()
    }

    /// Typed access to a live mode.
    pub fn get<S: ModeHooks>(&self, id: ModeId) -> Option<&Mode<S>> {
        self.find(id)?.mode.as_any().downcast_ref()
    }

    /// Typed mutable access to a live mode.
    pub fn get_mut<S: ModeHooks>(&mut self, id: ModeId) -> Option<&mut Mode<S>> {
        self.slots
            .iter_mut()
            .find(|slot| slot.mode.id() == id)?
            .mode
            .as_any_mut()
            .downcast_mut()
    }

    fn find(&self, id: ModeId) -> Option<&Slot> {
        self.slots.iter().find(|slot| slot.mode.id() == id)
    }

    /// Insertion sequence number of a live mode.
    pub fn sequence(&self, id: ModeId) -> Option<u64> {
        self.find(id).map(|slot| slot.seq)
    }

    /// Held handlers still waiting.
    pub fn timers(&self) -> &TimedScheduler {
        &self.timers
    }

    /// Callback faults seen since the stack was created.
    pub fn fault_count(&self) -> u64 {
        self.fault_count
    }

    /// Number of live modes.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no mode is live.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
