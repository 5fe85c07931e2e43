//! Driver bank: coils, lamps and other outputs with a host-side model of
//! what each one is currently doing.

use super::registry::{Entity, InsertError, Registry};
use crate::device::{Device, DeviceFault};
use std::time::Duration;
use thiserror::Error;

/// Slots per schedule second; one bit of the mask per slot.
pub const SCHEDULE_SLOTS: u32 = 32;

const SLOT: Duration = Duration::from_micros(1_000_000 / SCHEDULE_SLOTS as u64);

/// Failure to act on a driver.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriverError {
    #[error("no driver named '{0}'")]
    Unknown(String),

    #[error("driver '{0}' is board-timed and cannot run a schedule")]
    NotVirtual(String),

    #[error(transparent)]
    Device(#[from] DeviceFault),
}

/// Host-side view of a driver's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverStatus {
    Off,
    /// Timed pulse, off again at `until`.
    Pulsing { until: Duration },
    /// Zero-length pulse: on until disabled.
    Held,
    /// Repeating on/off duty cycle until disabled.
    Pattern { on_ms: u8, off_ms: u8 },
    /// Software schedule advanced by [`Driver::tick`].
    Scheduled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Schedule {
    mask: u32,
    /// Whole seconds to run; `None` repeats forever.
    cycles: Option<u32>,
    started_at: Duration,
    output_on: bool,
}

/// A coil, lamp or flasher output.
#[derive(Debug, Clone, PartialEq)]
pub struct Driver {
    number: u16,
    name: String,
    pulse_ms: u8,
    is_virtual: bool,
    status: DriverStatus,
    schedule: Option<Schedule>,
    last_changed: Duration,
}

impl Driver {
    /// Board-timed driver, initially off.
    pub fn new(number: u16, name: impl Into<String>, pulse_ms: u8) -> Self {
        Self {
            number,
            name: name.into(),
            pulse_ms,
            is_virtual: false,
            status: DriverStatus::Off,
            schedule: None,
            last_changed: Duration::ZERO,
        }
    }

    /// Mark the driver as software-timed rather than board-timed.
    pub fn virtual_driver(mut self) -> Self {
        self.is_virtual = true;
        self
    }

    /// Board number.
    pub fn number(&self) -> u16 {
        self.number
    }

    /// Configured name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured default pulse length.
    pub fn pulse_ms(&self) -> u8 {
        self.pulse_ms
    }

    /// Whether the driver is timed by the host and accepts schedules.
    pub fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    /// What the model believes the output is doing.
    pub fn status(&self) -> DriverStatus {
        self.status
    }

    /// Engine time of the last status or output change.
    pub fn last_changed(&self) -> Duration {
        self.last_changed
    }

    /// Whether the output is on or running a program.
    pub fn is_enabled(&self) -> bool {
        !matches!(self.status, DriverStatus::Off)
    }

    fn set_status(&mut self, status: DriverStatus, now: Duration) {
        self.status = status;
        self.last_changed = now;
    }

    /// Pulse for `ms` milliseconds; zero holds the driver on.
    pub fn pulse(&mut self, device: &mut dyn Device, ms: u8, now: Duration) -> Result<(), DeviceFault> {
        device.pulse(self.number, ms)?;
        self.schedule = None;
        let status = if ms == 0 {
            DriverStatus::Held
        } else {
            DriverStatus::Pulsing {
                until: now + Duration::from_millis(u64::from(ms)),
            }
        };
        self.set_status(status, now);
        Ok(())
    }

    /// Turn the output off and drop any schedule.
    pub fn disable(&mut self, device: &mut dyn Device, now: Duration) -> Result<(), DeviceFault> {
        device.disable(self.number)?;
        self.schedule = None;
        self.set_status(DriverStatus::Off, now);
        Ok(())
    }

    pub fn patter(
        &mut self,
        device: &mut dyn Device,
        on_ms: u8,
        off_ms: u8,
        original_on_ms: u8,
        now: Duration,
    ) -> Result<(), DeviceFault> {
        device.pattern(self.number, on_ms, off_ms, original_on_ms)?;
        self.schedule = None;
        self.set_status(DriverStatus::Pattern { on_ms, off_ms }, now);
        Ok(())
    }

    /// Drive the output from a 32-slot mask, one slot per 1/32 s, bit 0
    /// first. `cycles` limits the run to that many seconds.
    ///
    /// Only virtual drivers take schedules. An output left on by an earlier
    /// hold, pattern or schedule is switched off by the first tick when the
    /// mask starts low.
    pub fn schedule(&mut self, mask: u32, cycles: Option<u32>, now: Duration) -> Result<(), DriverError> {
        if !self.is_virtual {
            return Err(DriverError::NotVirtual(self.name.clone()));
        }
        let output_on = match self.schedule {
            Some(previous) => previous.output_on,
            None => self.is_enabled(),
        };
        self.schedule = Some(Schedule {
            mask,
            cycles: cycles.filter(|&c| c > 0),
            started_at: now,
            output_on,
        });
        self.set_status(DriverStatus::Scheduled, now);
        Ok(())
    }

    /// Advance the software model to `now`.
    ///
    /// Timed pulses lapse to off. Scheduled drivers switch their output at
    /// slot boundaries and stop once their cycle budget is spent.
    pub fn tick(&mut self, device: &mut dyn Device, now: Duration) -> Result<(), DeviceFault> {
        if let DriverStatus::Pulsing { until } = self.status {
            if now >= until {
                self.set_status(DriverStatus::Off, until);
            }
            return Ok(());
        }

        let Some(mut schedule) = self.schedule else {
            return Ok(());
        };

        let elapsed = now.saturating_sub(schedule.started_at);
        let slot = (elapsed.as_micros() / SLOT.as_micros()) as u64;
        let finished = schedule
            .cycles
            .is_some_and(|cycles| slot >= u64::from(cycles) * u64::from(SCHEDULE_SLOTS));

        if finished {
            return self.disable(device, now);
        }

        let want_on = schedule.mask & (1 << (slot % u64::from(SCHEDULE_SLOTS))) != 0;
        if want_on != schedule.output_on {
            if want_on {
                device.pulse(self.number, 0)?;
            } else {
                device.disable(self.number)?;
            }
            schedule.output_on = want_on;
            self.last_changed = now;
        }
        self.schedule = Some(schedule);
        Ok(())
    }
}

impl Entity for Driver {
    fn number(&self) -> u16 {
        self.number
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Machine-wide driver registry. Modes act on drivers through it; they never
/// own one.
#[derive(Debug, Clone, Default)]
pub struct DriverBank {
    drivers: Registry<Driver>,
}

impl DriverBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver; number and name must be unused.
    pub fn insert(&mut self, driver: Driver) -> Result<(), InsertError> {
        self.drivers.insert(driver)
    }

    /// Look a driver up by name.
    pub fn get(&self, name: &str) -> Option<&Driver> {
        self.drivers.by_name(name)
    }

    /// Look a driver up by board number.
    pub fn get_by_number(&self, number: u16) -> Option<&Driver> {
        self.drivers.get(number)
    }

    fn lookup(&mut self, name: &str) -> Result<&mut Driver, DriverError> {
        self.drivers
            .by_name_mut(name)
            .ok_or_else(|| DriverError::Unknown(name.to_string()))
    }

    pub fn pulse(
        &mut self,
        device: &mut dyn Device,
        name: &str,
        ms: u8,
        now: Duration,
    ) -> Result<(), DriverError> {
        Ok(self.lookup(name)?.pulse(device, ms, now)?)
    }

    /// Pulse using the driver's configured default length.
    pub fn pulse_default(
        &mut self,
        device: &mut dyn Device,
        name: &str,
        now: Duration,
    ) -> Result<(), DriverError> {
        let driver = self.lookup(name)?;
        let ms = driver.pulse_ms();
        Ok(driver.pulse(device, ms, now)?)
    }

    pub fn disable(
        &mut self,
        device: &mut dyn Device,
        name: &str,
        now: Duration,
    ) -> Result<(), DriverError> {
        Ok(self.lookup(name)?.disable(device, now)?)
    }

    pub fn patter(
        &mut self,
        device: &mut dyn Device,
        name: &str,
        on_ms: u8,
        off_ms: u8,
        original_on_ms: u8,
        now: Duration,
    ) -> Result<(), DriverError> {
        Ok(self
            .lookup(name)?
            .patter(device, on_ms, off_ms, original_on_ms, now)?)
    }

    pub fn schedule(
        &mut self,
        name: &str,
        mask: u32,
        cycles: Option<u32>,
        now: Duration,
    ) -> Result<(), DriverError> {
        self.lookup(name)?.schedule(mask, cycles, now)
    }

    /// Hold a driver on by number, used for the flipper relay.
    pub fn hold_number(
        &mut self,
        device: &mut dyn Device,
        number: u16,
        now: Duration,
    ) -> Result<(), DeviceFault> {
        match self.drivers.get_mut(number) {
            Some(driver) => driver.pulse(device, 0, now),
            None => device.pulse(number, 0),
        }
    }

    /// Force a driver off by number, used when tearing rules down.
    pub fn disable_number(
        &mut self,
        device: &mut dyn Device,
        number: u16,
        now: Duration,
    ) -> Result<(), DeviceFault> {
        match self.drivers.get_mut(number) {
            Some(driver) => driver.disable(device, now),
            None => device.disable(number),
        }
    }

    /// Advance every driver's software model.
    pub fn tick(&mut self, device: &mut dyn Device, now: Duration) -> Result<(), DeviceFault> {
        for driver in self.drivers.iter_mut() {
            driver.tick(device, now)?;
        }
        Ok(())
    }

    /// Drivers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Driver> {
        self.drivers.iter()
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DriverCall, SimulatedDevice};

    fn bank() -> DriverBank {
        let mut bank = DriverBank::new();
        bank.insert(Driver::new(1, "trough", 30)).unwrap();
        bank.insert(Driver::new(2, "flasher", 20).virtual_driver()).unwrap();
        bank
    }

    #[test]
    fn timed_pulse_lapses_on_tick() {
        let mut bank = bank();
        let mut device = SimulatedDevice::new();

        bank.pulse(&mut device, "trough", 30, Duration::ZERO).unwrap();
        assert!(bank.get("trough").unwrap().is_enabled());

        bank.tick(&mut device, Duration::from_millis(29)).unwrap();
        assert!(bank.get("trough").unwrap().is_enabled());

        bank.tick(&mut device, Duration::from_millis(30)).unwrap();
        assert_eq!(bank.get("trough").unwrap().status(), DriverStatus::Off);
    }

    #[test]
    fn zero_pulse_holds_until_disabled() {
        let mut bank = bank();
        let mut device = SimulatedDevice::new();

        bank.pulse(&mut device, "trough", 0, Duration::ZERO).unwrap();
        bank.tick(&mut device, Duration::from_secs(10)).unwrap();
        assert_eq!(bank.get("trough").unwrap().status(), DriverStatus::Held);

        bank.disable(&mut device, "trough", Duration::from_secs(10)).unwrap();
        assert_eq!(bank.get("trough").unwrap().status(), DriverStatus::Off);
    }

    #[test]
    fn default_pulse_uses_configured_length() {
        let mut bank = bank();
        let mut device = SimulatedDevice::new();

        bank.pulse_default(&mut device, "trough", Duration::ZERO).unwrap();
        assert_eq!(
            device.driver_calls(),
            vec![DriverCall::Pulse { driver: 1, ms: 30 }]
        );
    }

    #[test]
    fn unknown_driver_is_an_error() {
        let mut bank = bank();
        let mut device = SimulatedDevice::new();

        assert_eq!(
            bank.pulse(&mut device, "nope", 10, Duration::ZERO),
            Err(DriverError::Unknown("nope".to_string()))
        );
    }

    #[test]
    fn schedule_toggles_output_per_slot() {
        let mut bank = bank();
        let mut device = SimulatedDevice::new();

        // On for slot 0, off for slot 1, on again for slot 2.
        bank.schedule("flasher", 0b101, Some(1), Duration::ZERO).unwrap();

        bank.tick(&mut device, Duration::ZERO).unwrap();
        bank.tick(&mut device, SLOT).unwrap();
        bank.tick(&mut device, SLOT * 2).unwrap();

        assert_eq!(
            device.driver_calls(),
            vec![
                DriverCall::Pulse { driver: 2, ms: 0 },
                DriverCall::Disable { driver: 2 },
                DriverCall::Pulse { driver: 2, ms: 0 },
            ]
        );
    }

    #[test]
    fn schedule_turns_off_a_held_output_when_the_mask_starts_low() {
        let mut bank = bank();
        let mut device = SimulatedDevice::new();

        bank.pulse(&mut device, "flasher", 0, Duration::ZERO).unwrap();
        bank.schedule("flasher", 0, None, Duration::ZERO).unwrap();
        for slot in 0..40 {
            bank.tick(&mut device, SLOT * slot).unwrap();
        }

        assert_eq!(
            device.driver_calls(),
            vec![
                DriverCall::Pulse { driver: 2, ms: 0 },
                DriverCall::Disable { driver: 2 },
            ]
        );
        assert_eq!(bank.get("flasher").unwrap().status(), DriverStatus::Scheduled);
    }

    #[test]
    fn rescheduling_keeps_track_of_a_lit_output() {
        let mut bank = bank();
        let mut device = SimulatedDevice::new();

        bank.schedule("flasher", u32::MAX, None, Duration::ZERO).unwrap();
        bank.tick(&mut device, Duration::ZERO).unwrap();
        bank.schedule("flasher", 0, None, SLOT).unwrap();
        bank.tick(&mut device, SLOT).unwrap();

        assert_eq!(
            device.driver_calls().last(),
            Some(&DriverCall::Disable { driver: 2 })
        );
    }

    #[test]
    fn board_timed_drivers_refuse_schedules() {
        let mut bank = bank();

        assert_eq!(
            bank.schedule("trough", 0b1, None, Duration::ZERO),
            Err(DriverError::NotVirtual("trough".to_string()))
        );
        assert_eq!(bank.get("trough").unwrap().status(), DriverStatus::Off);
    }

    #[test]
    fn holding_by_number_updates_the_model() {
        let mut bank = bank();
        let mut device = SimulatedDevice::new();

        bank.hold_number(&mut device, 1, Duration::ZERO).unwrap();
        assert_eq!(bank.get("trough").unwrap().status(), DriverStatus::Held);
        assert_eq!(
            device.driver_calls(),
            vec![DriverCall::Pulse { driver: 1, ms: 0 }]
        );
    }

    #[test]
    fn schedule_stops_after_its_cycles() {
        let mut bank = bank();
        let mut device = SimulatedDevice::new();

        bank.schedule("flasher", u32::MAX, Some(1), Duration::ZERO).unwrap();
        bank.tick(&mut device, Duration::ZERO).unwrap();
        bank.tick(&mut device, Duration::from_secs(1)).unwrap();

        assert_eq!(bank.get("flasher").unwrap().status(), DriverStatus::Off);
        assert_eq!(
            device.driver_calls().last(),
            Some(&DriverCall::Disable { driver: 2 })
        );
    }
}
