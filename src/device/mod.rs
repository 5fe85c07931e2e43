//! The device boundary: event source, rule engine and driver outputs of the
//! control board.
//!
//! The engine treats the board as opaque. Hardware backends and the bundled
//! [`SimulatedDevice`] implement [`Device`].

mod error;
mod rule;
mod sim;

pub use error::DeviceFault;
pub use rule::{DriverAction, DriverDirective, RuleOptions, RuleTrigger};
pub use sim::{DriverCall, InstalledRule, SimulatedDevice};

use crate::core::Event;

/// Operations the engine needs from a control board.
///
/// Every call must return promptly; the run loop never blocks on the device.
pub trait Device: Send {
    /// Pending events in arrival order. An empty batch is normal.
    fn get_events(&mut self, include_frame_events: bool) -> Result<Vec<Event>, DeviceFault>;

    /// Replace the rule for `(switch, trigger)`.
    ///
    /// An empty `directives` slice removes the rule's effect.
    fn install_switch_rule(
        &mut self,
        switch: u16,
        trigger: RuleTrigger,
        options: RuleOptions,
        directives: &[DriverDirective],
        drive_outputs_now: bool,
    ) -> Result<(), DeviceFault>;

    fn pulse(&mut self, driver: u16, ms: u8) -> Result<(), DeviceFault>;

    fn disable(&mut self, driver: u16) -> Result<(), DeviceFault>;

    /// Repeat `on_ms`/`off_ms` after an initial `original_on_ms` pulse.
    fn pattern(
        &mut self,
        driver: u16,
        on_ms: u8,
        off_ms: u8,
        original_on_ms: u8,
    ) -> Result<(), DeviceFault>;

    /// Keep the board from dropping into its all-outputs-off safe state.
    fn tickle_watchdog(&mut self) -> Result<(), DeviceFault>;

    fn close(&mut self) -> Result<(), DeviceFault>;
}
