//! The machine: switch store, drivers, mode stack and the run loop.

use super::builder::MachineBuilder;
use super::queue::{DeferredCommand, DeferredCommandQueue};
use super::report::{LoopExit, LoopReport, MachineStats};
use super::stop::StopHandle;
use crate::config::{ConfigurationErrors, LoopConfig, MachineConfig};
use crate::core::{Clock, DriverBank, DriverError, Event, EventKind, Switch, SwitchStore};
use crate::device::{Device, DeviceFault};
use crate::game::{GameFlow, GameLifecycle, GameRequest, GameStatus};
use crate::modes::{
    panic_message, DispatchReport, HandlerError, Mode, ModeContext, ModeHooks, ModeId, ModeStack,
    Request, StackedMode,
};
use crate::rules::{FlipperTiming, RuleCompiler};
use chrono::Utc;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Callback for frame-displayed events.
pub type FrameHandler = Box<dyn FnMut(&mut ModeContext<'_>) -> Result<(), HandlerError> + Send>;

/// Rounds of deferred requests applied after one dispatch before the rest
/// are dropped. Bounds modes that keep re-adding each other.
const MAX_SETTLE_ROUNDS: usize = 64;

/// Hardware-facing state handed to callbacks.
struct Board {
    switches: SwitchStore,
    drivers: DriverBank,
    device: Box<dyn Device>,
    clock: Box<dyn Clock>,
}

impl Board {
    fn context(&mut self, now: Duration, game: GameStatus, flippers_enabled: bool) -> ModeContext<'_> {
        ModeContext::new(
            now,
            &self.switches,
            &mut self.drivers,
            self.device.as_mut(),
            game,
            flippers_enabled,
        )
    }
}

/// Everything that reacts to the board.
struct Engine {
    stack: ModeStack,
    game: GameFlow,
    compiler: RuleCompiler,
    frame_handler: Option<FrameHandler>,
    stats: MachineStats,
}

impl Engine {
    fn record(&mut self, report: &DispatchReport) -> Result<(), DeviceFault> {
        self.stats.handler_faults += report.faults.len() as u64;
        match report.device_fault() {
            Some(fault) => Err(fault.clone()),
            None => Ok(()),
        }
    }

    /// Apply requests queued by callbacks until none remain.
    fn settle(&mut self, ctx: &mut ModeContext<'_>) -> Result<(), DeviceFault> {
        for _ in 0..MAX_SETTLE_ROUNDS {
            let requests = ctx.take_requests();
            if requests.is_empty() {
                return Ok(());
            }
            for request in requests {
                self.apply(request, ctx)?;
            }
        }

        let dropped = ctx.take_requests().len();
        if dropped > 0 {
            log::error!("dropping {dropped} mode request(s) after {MAX_SETTLE_ROUNDS} rounds");
        }
        Ok(())
    }

    fn apply(&mut self, request: Request, ctx: &mut ModeContext<'_>) -> Result<(), DeviceFault> {
        match request {
            Request::AddMode(mode) => {
                self.stack.add(mode, ctx)?;
            }
            Request::RemoveMode(id) => {
                if !self.stack.remove(id, ctx)? {
                    log::debug!("mode {id} was not on the stack");
                }
            }
            Request::Game(request) => {
                self.game.apply(request, ctx)?;
                ctx.set_game(self.game.status());
            }
            Request::Flippers(enable) => {
                let now = ctx.now();
                let (device, drivers) = ctx.outputs();
                self.compiler.set_enabled(enable, device, drivers, now)?;
                ctx.set_flippers_enabled(enable);
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, switch: &Switch, ctx: &mut ModeContext<'_>) -> Result<(), DeviceFault> {
        self.stats.dispatches += 1;
        let report = self.stack.dispatch(switch, ctx);
        let walked = self.record(&report);
        self.settle(ctx)?;
        walked
    }

    fn tick(&mut self, ctx: &mut ModeContext<'_>) -> Result<(), DeviceFault> {
        let report = self.stack.tick(ctx);
        let ticked = self.record(&report);
        self.settle(ctx)?;
        ticked
    }

    fn frame(&mut self, ctx: &mut ModeContext<'_>) -> Result<(), DeviceFault> {
        self.stats.frames += 1;
        let Some(handler) = self.frame_handler.as_mut() else {
            return Ok(());
        };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(&mut *ctx)));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(HandlerError::Device(fault))) => return Err(fault),
            Ok(Err(error)) => {
                self.stats.handler_faults += 1;
                log::error!("frame handler failed: {error}");
            }
            Err(payload) => {
                self.stats.handler_faults += 1;
                log::error!("frame handler panicked: {}", panic_message(payload.as_ref()));
            }
        }
        self.settle(ctx)
    }
}

/// A running pinball machine.
///
/// Owns the switch store, the driver bank, the mode stack and the device.
/// Everything except the [`DeferredCommandQueue`] is confined to the thread
/// calling [`run`](Self::run) or [`step`](Self::step).
pub struct Machine {
    board: Board,
    engine: Engine,
    queue: Arc<DeferredCommandQueue>,
    config: LoopConfig,
    closed: bool,
}

impl Machine {
    /// Start building a machine from `config`.
    pub fn builder(config: MachineConfig) -> MachineBuilder {
        MachineBuilder::new(config)
    }

    pub(crate) fn assemble(
        config: &MachineConfig,
        loop_config: LoopConfig,
        device: Box<dyn Device>,
        clock: Box<dyn Clock>,
        lifecycle: Box<dyn GameLifecycle>,
        queue_capacity: usize,
    ) -> Result<Self, ConfigurationErrors> {
        let switches = config.switch_store()?;
        let drivers = config.driver_bank()?;
        let compiler = RuleCompiler::new(
            config,
            &switches,
            &drivers,
            FlipperTiming::from(&loop_config),
        )?;
        log::info!(
            "machine up: {} switches, {} drivers, {:?} flippers",
            switches.len(),
            drivers.len(),
            compiler.family()
        );

        Ok(Self {
            board: Board {
                switches,
                drivers,
                device,
                clock,
            },
            engine: Engine {
                stack: ModeStack::new(loop_config.overrun_tolerance),
                game: GameFlow::new(u32::from(config.game.balls_per_game), lifecycle),
                compiler,
                frame_handler: None,
                stats: MachineStats::default(),
            },
            queue: Arc::new(DeferredCommandQueue::new(queue_capacity)),
            config: loop_config,
            closed: false,
        })
    }

    /// Current switch levels.
    pub fn switches(&self) -> &SwitchStore {
        &self.board.switches
    }

    /// Host-side driver model.
    pub fn drivers(&self) -> &DriverBank {
        &self.board.drivers
    }

    /// Live modes in dispatch order.
    pub fn modes(&self) -> &ModeStack {
        &self.engine.stack
    }

    /// Typed access to a live mode's state.
    pub fn mode<S: ModeHooks>(&self, id: ModeId) -> Option<&Mode<S>> {
        self.engine.stack.get(id)
    }

    /// Snapshot of the game in progress, if any.
    pub fn game(&self) -> GameStatus {
        self.engine.game.status()
    }

    /// Whether flipper and bumper rules are installed.
    pub fn flippers_enabled(&self) -> bool {
        self.engine.compiler.is_enabled()
    }

    pub fn rules(&self) -> &RuleCompiler {
        &self.engine.compiler
    }

    pub fn loop_config(&self) -> &LoopConfig {
        &self.config
    }

    /// Handle for posting driver commands from other threads.
    pub fn command_queue(&self) -> Arc<DeferredCommandQueue> {
        Arc::clone(&self.queue)
    }

    /// Counters since the machine was built.
    pub fn stats(&self) -> MachineStats {
        self.engine.stats
    }

    /// Engine time from the machine clock.
    pub fn now(&self) -> Duration {
        self.board.clock.now()
    }

    /// Whether the device has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Route frame-displayed events to `handler`.
    pub fn set_frame_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&mut ModeContext<'_>) -> Result<(), HandlerError> + Send + 'static,
    {
        self.engine.frame_handler = Some(Box::new(handler));
    }

    /// Run `body` with a fresh callback context, then apply whatever it queued.
    fn with_context<R>(
        &mut self,
        now: Duration,
        body: impl FnOnce(&mut Engine, &mut ModeContext<'_>) -> Result<R, DeviceFault>,
    ) -> Result<R, DeviceFault> {
        let game = self.engine.game.status();
        let flippers_enabled = self.engine.compiler.is_enabled();
        let mut ctx = self.board.context(now, game, flippers_enabled);
        let value = body(&mut self.engine, &mut ctx);
        let settled = self.engine.settle(&mut ctx);
        let value = value?;
        settled?;
        Ok(value)
    }

    /// Push a mode onto the stack and run its start hook.
    pub fn add_mode<M: StackedMode + 'static>(&mut self, mode: M) -> Result<ModeId, DeviceFault> {
        let now = self.now();
        self.with_context(now, |engine, ctx| engine.stack.add(Box::new(mode), ctx))
    }

    /// Remove a mode, returning whether it was on the stack.
    pub fn remove_mode(&mut self, id: ModeId) -> Result<bool, DeviceFault> {
        let now = self.now();
        self.with_context(now, |engine, ctx| engine.stack.remove(id, ctx))
    }

    /// Apply a game-flow request outside any callback.
    pub fn request_game(&mut self, request: GameRequest) -> Result<(), DeviceFault> {
        let now = self.now();
        self.with_context(now, |engine, ctx| engine.apply(Request::Game(request), ctx))
    }

    /// Install or tear down the flipper and bumper rules.
    ///
    /// Returns whether any rule was written.
    pub fn enable_flippers(&mut self, enable: bool) -> Result<bool, DeviceFault> {
        let now = self.now();
        let Board {
            drivers, device, ..
        } = &mut self.board;
        self.engine
            .compiler
            .set_enabled(enable, device.as_mut(), drivers, now)
    }

    /// Remove every mode, end any game and disable the flippers.
    pub fn reset(&mut self) -> Result<(), DeviceFault> {
        log::info!("resetting machine");
        let now = self.now();
        self.with_context(now, |engine, ctx| engine.stack.clear(ctx))?;
        self.engine.game.reset();
        self.enable_flippers(false)?;
        Ok(())
    }

    /// Apply one device event.
    ///
    /// Switch events update the store and, when the level really changed,
    /// dispatch down the mode stack. Frame events go to the frame handler.
    /// Empty and invalid events are ignored.
    pub fn process_event(&mut self, event: Event) -> Result<(), DeviceFault> {
        let now = self.now();
        self.handle_event(event, now)
    }

    fn handle_event(&mut self, event: Event, now: Duration) -> Result<(), DeviceFault> {
        if let Some(closed) = event.kind.switch_level() {
            return self.switch_changed(event.value, closed, now);
        }
        match event.kind {
            EventKind::FrameDisplayed => self.with_context(now, |engine, ctx| engine.frame(ctx)),
            kind => {
                log::trace!("ignoring {kind:?} event");
                Ok(())
            }
        }
    }

    fn switch_changed(&mut self, number: u16, closed: bool, now: Duration) -> Result<(), DeviceFault> {
        self.engine.stats.switch_events += 1;
        match self.board.switches.set_state(number, closed, now) {
            None => {
                log::warn!("event for unknown switch {number}");
                return Ok(());
            }
            Some(previous) if previous == closed => {
                self.engine.stats.duplicate_events += 1;
                log::trace!("switch {number} already {}", if closed { "closed" } else { "open" });
                return Ok(());
            }
            Some(_) => {}
        }

        self.with_context(now, |engine, ctx| {
            match ctx.switches().get_by_number(number) {
                Some(switch) => {
                    log::debug!(
                        "switch '{}' {}",
                        switch.name(),
                        if switch.is_active() { "active" } else { "inactive" }
                    );
                    engine.dispatch(switch, ctx)
                }
                None => Ok(()),
            }
        })
    }

    /// One run loop iteration, without the trailing sleep.
    ///
    /// Order: device events, mode ticks and held handlers, driver models,
    /// deferred commands, watchdog.
    pub fn step(&mut self) -> Result<(), DeviceFault> {
        let events = self
            .board
            .device
            .get_events(self.config.include_frame_events)?;
        let now = self.now();
        for event in events {
            self.handle_event(event, now)?;
        }

        self.with_context(now, |engine, ctx| engine.tick(ctx))?;

        self.board.drivers.tick(self.board.device.as_mut(), now)?;
        self.drain_commands(now)?;
        self.board.device.tickle_watchdog()?;

        self.engine.stats.iterations += 1;
        Ok(())
    }

    fn drain_commands(&mut self, now: Duration) -> Result<(), DeviceFault> {
        let commands = self.queue.drain();
        if commands.is_empty() {
            return Ok(());
        }
        log::trace!("applying {} deferred command(s)", commands.len());

        let Board {
            drivers, device, ..
        } = &mut self.board;
        for command in commands {
            self.engine.stats.deferred_commands += 1;
            let result = match &command {
                DeferredCommand::Pulse { driver, ms } => {
                    drivers.pulse(device.as_mut(), driver, *ms, now)
                }
                DeferredCommand::Disable { driver } => drivers.disable(device.as_mut(), driver, now),
            };
            match result {
                Ok(()) => {}
                Err(DriverError::Unknown(name)) => {
                    log::warn!("deferred command for unknown driver '{name}'");
                }
                Err(DriverError::Device(fault)) => return Err(fault),
                Err(error) => log::warn!("deferred command skipped: {error}"),
            }
        }
        Ok(())
    }

    /// Run until `stop` is triggered, the device fails, or an iteration
    /// panics. The device is closed exactly once on the way out.
    pub fn run(&mut self, stop: &StopHandle) -> LoopReport {
        let started_at = Utc::now();
        if self.closed {
            log::warn!("run called on a closed machine");
            return LoopReport {
                iterations: 0,
                started_at,
                ended_at: Utc::now(),
                exit: LoopExit::AlreadyClosed,
            };
        }

        log::info!("run loop starting");
        let mut iterations = 0;
        let exit = loop {
            if stop.is_stopped() {
                break LoopExit::Cancelled;
            }
            match panic::catch_unwind(AssertUnwindSafe(|| self.step())) {
                Ok(Ok(())) => {}
                Ok(Err(fault)) => {
                    log::error!("device fault, stopping run loop: {fault}");
                    break LoopExit::DeviceFault(fault.to_string());
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    log::error!("run loop iteration panicked: {message}");
                    break LoopExit::Panicked(message);
                }
            }
            iterations += 1;
            if !self.config.delay.is_zero() {
                thread::sleep(self.config.delay);
            }
        };

        self.close();
        log::info!("run loop stopped after {iterations} iteration(s): {exit:?}");
        LoopReport {
            iterations,
            started_at,
            ended_at: Utc::now(),
            exit,
        }
    }

    /// Close the device. Later calls do nothing.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(fault) = self.board.device.close() {
            log::error!("closing device failed: {fault}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DriverConfig, MachineType, SwitchConfig};
    use crate::core::{ManualClock, Wiring};
    use crate::device::{DriverCall, SimulatedDevice};
    use crate::modes::{SwitchCondition, SwitchOutcome};
    use std::sync::Mutex;

    fn config() -> MachineConfig {
        let mut config = MachineConfig::new(MachineType::Wpc);
        config.switches.push(SwitchConfig {
            name: "start".to_string(),
            number: 1,
            wiring: Wiring::NormallyOpen,
            tags: Vec::new(),
        });
        config.coils.push(DriverConfig {
            name: "knocker".to_string(),
            number: 9,
            pulse_ms: 25,
            is_virtual: false,
        });
        config
    }

    fn machine() -> (Machine, SimulatedDevice, ManualClock) {
        let device = SimulatedDevice::new();
        let clock = ManualClock::new();
        let machine = Machine::builder(config())
            .clock(clock.clone())
            .build(device.clone())
            .unwrap();
        (machine, device, clock)
    }

    #[test]
    fn duplicate_switch_events_do_not_dispatch() {
        let (mut machine, _device, _clock) = machine();
        let hits = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&hits);
        let mut mode = Mode::new("base", 10, ());
        mode.on("start", SwitchCondition::Closed, move |_, _, _| {
            *sink.lock().unwrap() += 1;
            Ok(SwitchOutcome::Continue)
        });
        machine.add_mode(mode).unwrap();

        machine.process_event(Event::switch_closed(1)).unwrap();
        machine.process_event(Event::switch_closed(1)).unwrap();

        assert_eq!(*hits.lock().unwrap(), 1);
        assert_eq!(machine.stats().duplicate_events, 1);
        assert_eq!(machine.stats().dispatches, 1);
    }

    #[test]
    fn unknown_switch_and_empty_events_are_ignored() {
        let (mut machine, _device, _clock) = machine();
        machine.process_event(Event::switch_closed(77)).unwrap();
        machine
            .process_event(Event {
                kind: EventKind::Invalid,
                value: 1,
            })
            .unwrap();
        assert_eq!(machine.stats().dispatches, 0);
        assert!(machine.switches().get("start").unwrap().is_open());
    }

    #[test]
    fn modes_added_from_a_handler_apply_after_the_walk() {
        let (mut machine, _device, _clock) = machine();
        let mut attract = Mode::new("attract", 10, ());
        attract.on("start", SwitchCondition::Active, |_, _, ctx| {
            ctx.add_mode(Mode::new("game", 20, ()));
            ctx.remove_self();
            ctx.request_game(GameRequest::StartGame);
            Ok(SwitchOutcome::Continue)
        });
        machine.add_mode(attract).unwrap();

        machine.process_event(Event::switch_closed(1)).unwrap();

        assert_eq!(machine.modes().names(), vec![("game", 20)]);
        assert!(machine.game().in_progress);
    }

    #[test]
    fn deferred_commands_run_in_step_and_unknown_names_are_skipped() {
        let (mut machine, device, _clock) = machine();
        let queue = machine.command_queue();
        queue.enqueue_pulse("knocker", 40).unwrap();
        queue.enqueue_pulse("missing", 40).unwrap();
        queue.enqueue_disable("knocker").unwrap();

        machine.step().unwrap();

        assert_eq!(
            device.driver_calls(),
            vec![
                DriverCall::Pulse { driver: 9, ms: 40 },
                DriverCall::Disable { driver: 9 },
            ]
        );
        assert!(queue.is_empty());
        assert_eq!(device.watchdog_tickles(), 1);
    }

    #[test]
    fn frame_events_reach_the_frame_handler() {
        let (mut machine, device, _clock) = machine();
        let frames = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&frames);
        machine.set_frame_handler(move |_ctx| {
            *sink.lock().unwrap() += 1;
            Ok(())
        });
        device.add_event(Event::frame_displayed());

        machine.step().unwrap();
        assert_eq!(*frames.lock().unwrap(), 1);
        assert_eq!(machine.stats().frames, 1);
    }

    #[test]
    fn stopped_handle_closes_without_iterating() {
        let (mut machine, device, _clock) = machine();
        let stop = StopHandle::new();
        stop.stop();

        let report = machine.run(&stop);
        assert_eq!(report.exit, LoopExit::Cancelled);
        assert_eq!(report.iterations, 0);
        assert_eq!(device.close_count(), 1);

        let again = machine.run(&stop);
        assert_eq!(again.exit, LoopExit::AlreadyClosed);
        assert_eq!(device.close_count(), 1);
    }
}
