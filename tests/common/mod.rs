//! Shared fixtures: a small WPC machine on a simulated board.

#![allow(dead_code)]

use pinstack::config::{DriverConfig, MachineConfig, MachineType, SwitchConfig};
use pinstack::core::{ManualClock, Wiring};
use pinstack::device::SimulatedDevice;
use pinstack::runtime::Machine;
use pinstack::LoopConfig;
use std::sync::{Arc, Mutex};

pub const START: u16 = 13;
pub const TROUGH: [u16; 4] = [21, 22, 23, 24];
pub const FLIPPER_LEFT: u16 = 1;
pub const SLING: u16 = 40;

pub fn switch(name: &str, number: u16, tags: &[&str]) -> SwitchConfig {
    SwitchConfig {
        name: name.to_string(),
        number,
        wiring: Wiring::NormallyOpen,
        tags: tags.iter().map(|tag| tag.to_string()).collect(),
    }
}

pub fn coil(name: &str, number: u16) -> DriverConfig {
    DriverConfig {
        name: name.to_string(),
        number,
        pulse_ms: 30,
        is_virtual: false,
    }
}

pub fn wpc_config() -> MachineConfig {
    let mut config = MachineConfig::new(MachineType::Wpc);
    config.switches.push(switch("start", START, &[]));
    for (index, number) in TROUGH.iter().enumerate() {
        config
            .switches
            .push(switch(&format!("trough{}", index + 1), *number, &["trough"]));
    }
    config.switches.push(switch("flipperLwL", FLIPPER_LEFT, &[]));
    config.switches.push(switch("slingL", SLING, &[]));
    config.coils.push(coil("flipperLwLMain", 32));
    config.coils.push(coil("flipperLwLHold", 33));
    config.coils.push(coil("slingL", 41));
    config.coils.push(coil("knocker", 7));
    config.coils.push(coil("trough", 8));
    config.flippers.push("flipperLwL".to_string());
    config.bumpers.push("slingL".to_string());
    config
}

pub struct Rig {
    pub machine: Machine,
    pub device: SimulatedDevice,
    pub clock: ManualClock,
}

pub fn rig_with(device: SimulatedDevice, loop_config: LoopConfig) -> Rig {
    let clock = ManualClock::new();
    let machine = Machine::builder(wpc_config())
        .loop_config(loop_config)
        .clock(clock.clone())
        .build(device.clone())
        .expect("fixture configuration is valid");
    Rig {
        machine,
        device,
        clock,
    }
}

pub fn rig() -> Rig {
    rig_with(SimulatedDevice::new(), LoopConfig::default())
}

/// Append-only log shared between handlers and the test body.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}
