//! The view of the machine handed to mode callbacks.

use super::mode::{ModeId, StackedMode};
use crate::core::{DriverBank, DriverError, Switch, SwitchStore};
use crate::device::Device;
use crate::game::{GameRequest, GameStatus};
use std::time::Duration;

/// A structural change asked for from inside a callback.
///
/// Requests are applied by the engine after the current dispatch completes,
/// so the stack never changes under a walk in progress.
pub(crate) enum Request {
    AddMode(Box<dyn StackedMode>),
    RemoveMode(ModeId),
    Game(GameRequest),
    Flippers(bool),
}

/// Access to switches, drivers and deferred requests during a callback.
pub struct ModeContext<'a> {
    now: Duration,
    mode: Option<ModeId>,
    switches: &'a SwitchStore,
    drivers: &'a mut DriverBank,
    device: &'a mut dyn Device,
    game: GameStatus,
    flippers_enabled: bool,
    requests: Vec<Request>,
}

impl<'a> ModeContext<'a> {
    pub(crate) fn new(
        now: Duration,
        switches: &'a SwitchStore,
        drivers: &'a mut DriverBank,
        device: &'a mut dyn Device,
        game: GameStatus,
        flippers_enabled: bool,
    ) -> Self {
        Self {
            now,
            mode: None,
            switches,
            drivers,
            device,
            game,
            flippers_enabled,
            requests: Vec::new(),
        }
    }

    /// Engine time at which this callback runs.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// The mode whose callback is running, if any.
    pub fn mode_id(&self) -> Option<ModeId> {
        self.mode
    }

    pub fn switches(&self) -> &'a SwitchStore {
        self.switches
    }

    /// Look a switch up by name.
    pub fn switch(&self, name: &str) -> Option<&'a Switch> {
        self.switches.get(name)
    }

    /// Whether the named switch is active; unknown names read inactive.
    pub fn is_active(&self, name: &str) -> bool {
        self.switches.is_active(name)
    }

    /// Time `name` has spent at its current level, `None` if unknown.
    pub fn time_since_change(&self, name: &str) -> Option<Duration> {
        self.switches
            .get(name)
            .map(|switch| switch.time_since_change(self.now))
    }

    pub fn drivers(&self) -> &DriverBank {
        &*self.drivers
    }

    /// Game status as of the start of this callback.
    pub fn game(&self) -> GameStatus {
        self.game
    }

    pub fn flippers_enabled(&self) -> bool {
        self.flippers_enabled
    }

    /// Pulse a driver now; zero holds it on.
    pub fn pulse(&mut self, driver: &str, ms: u8) -> Result<(), DriverError> {
        self.drivers.pulse(self.device, driver, ms, self.now)
    }

    /// Pulse with the driver's configured default length.
    pub fn pulse_default(&mut self, driver: &str) -> Result<(), DriverError> {
        self.drivers.pulse_default(self.device, driver, self.now)
    }

    /// Turn a driver off now.
    pub fn disable(&mut self, driver: &str) -> Result<(), DriverError> {
        self.drivers.disable(self.device, driver, self.now)
    }

    pub fn patter(
        &mut self,
        driver: &str,
        on_ms: u8,
        off_ms: u8,
        original_on_ms: u8,
    ) -> Result<(), DriverError> {
        self.drivers
            .patter(self.device, driver, on_ms, off_ms, original_on_ms, self.now)
    }

    /// Run `mask` bit by bit, one slot per tick.
    pub fn schedule(&mut self, driver: &str, mask: u32, cycles: Option<u32>) -> Result<(), DriverError> {
        self.drivers.schedule(driver, mask, cycles, self.now)
    }

    /// Push a mode onto the stack once the current dispatch completes.
    pub fn add_mode<M: StackedMode + 'static>(&mut self, mode: M) -> ModeId {
        let id = mode.id();
        self.requests.push(Request::AddMode(Box::new(mode)));
        id
    }

    /// Remove a mode once the current dispatch completes.
    pub fn remove_mode(&mut self, id: ModeId) {
        self.requests.push(Request::RemoveMode(id));
    }

    /// Remove the mode whose callback is running.
    pub fn remove_self(&mut self) {
        if let Some(id) = self.mode {
            self.remove_mode(id);
        }
    }

    /// Advance the game flow once the current dispatch completes.
    pub fn request_game(&mut self, request: GameRequest) {
        self.requests.push(Request::Game(request));
    }

    /// Install or tear down the board-resident flipper rules.
    pub fn enable_flippers(&mut self, enable: bool) {
        self.requests.push(Request::Flippers(enable));
    }

    pub fn has_pending_requests(&self) -> bool {
        !self.requests.is_empty()
    }

    pub(crate) fn set_mode(&mut self, mode: Option<ModeId>) -> Option<ModeId> {
        std::mem::replace(&mut self.mode, mode)
    }

    pub(crate) fn set_game(&mut self, game: GameStatus) {
        self.game = game;
    }

    pub(crate) fn set_flippers_enabled(&mut self, enabled: bool) {
        self.flippers_enabled = enabled;
    }

    pub(crate) fn take_requests(&mut self) -> Vec<Request> {
        std::mem::take(&mut self.requests)
    }

    /// Device and driver bank, for engine code outside the callback API.
    pub(crate) fn outputs(&mut self) -> (&mut dyn Device, &mut DriverBank) {
        (&mut *self.device, &mut *self.drivers)
    }
}
