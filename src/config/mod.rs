//! Machine configuration.
//!
//! Configuration is read once at bring-up. It names every switch and driver,
//! lists which switches are flippers and bumpers, and carries the game
//! settings. Loading from disk belongs to the host; this module only parses
//! and checks the document.
//!
//! # Example
//!
//! ```rust
//! use pinstack::config::MachineConfig;
//!
//! let config = MachineConfig::from_json_str(r#"{
//!     "machine_type": "Wpc",
//!     "switches": [{ "name": "flipperLwL", "number": 1 }],
//!     "coils": [
//!         { "name": "flipperLwLMain", "number": 10 },
//!         { "name": "flipperLwLHold", "number": 11 }
//!     ],
//!     "flippers": ["flipperLwL"]
//! }"#).unwrap();
//!
//! assert!(config.validate().is_ok());
//! ```

mod error;
mod validate;

pub use error::{ConfigurationError, ConfigurationErrors};

use crate::core::{Driver, DriverBank, InsertError, Switch, SwitchStore, Wiring};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Board families the rule compiler knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineType {
    Wpc,
    Wpc95,
    WpcAlphanumeric,
    SternWhitestar,
    SternSam,
    Pdb,
}

/// How flipper coils are wired for a [`MachineType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipperFamily {
    /// Separate main (power) and hold coils per flipper.
    DualCoil,
    /// One coil per flipper, held with a patter duty cycle.
    SingleCoilPattern,
}

impl MachineType {
    pub fn flipper_family(self) -> FlipperFamily {
        match self {
            Self::Wpc | Self::Wpc95 | Self::WpcAlphanumeric | Self::Pdb => FlipperFamily::DualCoil,
            Self::SternWhitestar | Self::SternSam => FlipperFamily::SingleCoilPattern,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchConfig {
    pub name: String,
    pub number: u16,
    #[serde(default)]
    pub wiring: Wiring,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfig {
    pub name: String,
    pub number: u16,
    #[serde(default = "default_pulse_ms")]
    pub pulse_ms: u8,
    /// Timed by the host instead of the board.
    #[serde(default, rename = "virtual")]
    pub is_virtual: bool,
}

fn default_pulse_ms() -> u8 {
    30
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Balls installed in the machine.
    pub num_balls: u8,
    pub balls_per_game: u8,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            num_balls: 4,
            balls_per_game: 3,
        }
    }
}

/// Whole-machine configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineConfig {
    pub machine_type: MachineType,
    #[serde(default)]
    pub switches: Vec<SwitchConfig>,
    #[serde(default)]
    pub coils: Vec<DriverConfig>,
    #[serde(default)]
    pub lamps: Vec<DriverConfig>,
    /// Flipper switch names. Coils are found as `<name>Main` / `<name>Hold`.
    #[serde(default)]
    pub flippers: Vec<String>,
    /// Bumper switch names. Each fires the coil with the same name.
    #[serde(default)]
    pub bumpers: Vec<String>,
    /// Coil that powers the flipper circuit, held on while flippers are live.
    #[serde(default)]
    pub flipper_relay: Option<String>,
    #[serde(default)]
    pub game: GameConfig,
}

impl MachineConfig {
    /// Empty configuration for `machine_type` with default game settings.
    pub fn new(machine_type: MachineType) -> Self {
        Self {
            machine_type,
            switches: Vec::new(),
            coils: Vec::new(),
            lamps: Vec::new(),
            flippers: Vec::new(),
            bumpers: Vec::new(),
            flipper_relay: None,
            game: GameConfig::default(),
        }
    }

    /// Parse a JSON document. Call [`validate`](Self::validate) before use.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(json).map_err(|e| ConfigurationError::Parse(e.to_string()))
    }

    /// Build the switch store, all switches open.
    pub fn switch_store(&self) -> Result<SwitchStore, ConfigurationErrors> {
        let mut store = SwitchStore::new();
        let mut errors = Vec::new();
        for sw in &self.switches {
            let switch = Switch::new(sw.number, sw.name.clone(), sw.wiring).with_tags(sw.tags.clone());
            if let Err(e) = store.insert(switch) {
                errors.push(duplicate("switch", e));
            }
        }
        if errors.is_empty() {
            Ok(store)
        } else {
            Err(ConfigurationErrors(errors))
        }
    }

    /// Build the driver bank from coils and lamps, all outputs off.
    pub fn driver_bank(&self) -> Result<DriverBank, ConfigurationErrors> {
        let mut bank = DriverBank::new();
        let mut errors = Vec::new();
        for cfg in self.coils.iter().chain(self.lamps.iter()) {
            let mut driver = Driver::new(cfg.number, cfg.name.clone(), cfg.pulse_ms);
            if cfg.is_virtual {
                driver = driver.virtual_driver();
            }
            if let Err(e) = bank.insert(driver) {
                errors.push(duplicate("driver", e));
            }
        }
        if errors.is_empty() {
            Ok(bank)
        } else {
            Err(ConfigurationErrors(errors))
        }
    }
}

fn duplicate(kind: &'static str, error: InsertError) -> ConfigurationError {
    match error {
        InsertError::DuplicateName(name) => ConfigurationError::DuplicateName { kind, name },
        InsertError::DuplicateNumber(number) => ConfigurationError::DuplicateNumber { kind, number },
    }
}

/// Run loop and rule timing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Sleep at the end of each iteration. Zero busy-polls.
    pub delay: Duration,
    /// Ask the device for frame-displayed events.
    pub include_frame_events: bool,
    /// Lateness past which a timed handler is reported as overrun.
    pub overrun_tolerance: Duration,
    /// Main coil pulse when a flipper closes.
    pub flipper_pulse_ms: u8,
    /// Single-coil hold duty cycle.
    pub patter_on_ms: u8,
    pub patter_off_ms: u8,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            delay: Duration::ZERO,
            include_frame_events: true,
            overrun_tolerance: Duration::from_millis(100),
            flipper_pulse_ms: 34,
            patter_on_ms: 2,
            patter_off_ms: 18,
        }
    }
}
