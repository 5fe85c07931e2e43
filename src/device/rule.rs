//! Board-resident switch rule vocabulary.

use serde::{Deserialize, Serialize};

/// Electrical transition a switch rule is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleTrigger {
    ClosedNondebounced,
    OpenNondebounced,
    ClosedDebounced,
    OpenDebounced,
}

/// Flags stored alongside a rule on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RuleOptions {
    /// Also report the transition to the host as an event.
    pub notify_host: bool,
    /// Re-arm the rule while it is active so repeated contact re-fires.
    pub reload_active: bool,
}

/// What a rule does to one driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverAction {
    /// Drive for `ms` milliseconds. Zero holds the driver on until disabled.
    Pulse { ms: u8 },
    Disable,
    /// Pulse for `original_on_ms`, then repeat `on_ms` on / `off_ms` off.
    Patter {
        on_ms: u8,
        off_ms: u8,
        original_on_ms: u8,
    },
}

/// One driver-state directive inside a switch rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverDirective {
    pub driver: u16,
    pub action: DriverAction,
}

impl DriverDirective {
    pub fn pulse(driver: u16, ms: u8) -> Self {
        Self {
            driver,
            action: DriverAction::Pulse { ms },
        }
    }

    /// Zero-length pulse: hold the driver on.
    pub fn hold(driver: u16) -> Self {
        Self::pulse(driver, 0)
    }

    pub fn disable(driver: u16) -> Self {
        Self {
            driver,
            action: DriverAction::Disable,
        }
    }

    pub fn patter(driver: u16, on_ms: u8, off_ms: u8, original_on_ms: u8) -> Self {
        Self {
            driver,
            action: DriverAction::Patter {
                on_ms,
                off_ms,
                original_on_ms,
            },
        }
    }
}
