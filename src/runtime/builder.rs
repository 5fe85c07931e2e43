//! Builder for constructing machines.

use super::machine::Machine;
use super::queue::DEFAULT_QUEUE_CAPACITY;
use crate::config::{ConfigurationErrors, LoopConfig, MachineConfig};
use crate::core::{Clock, SystemClock};
use crate::device::Device;
use crate::game::GameLifecycle;

/// Builder for a [`Machine`] with a fluent API.
pub struct MachineBuilder {
    config: MachineConfig,
    loop_config: LoopConfig,
    clock: Option<Box<dyn Clock>>,
    lifecycle: Option<Box<dyn GameLifecycle>>,
    queue_capacity: usize,
}

impl MachineBuilder {
    pub fn new(config: MachineConfig) -> Self {
        Self {
            config,
            loop_config: LoopConfig::default(),
            clock: None,
            lifecycle: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    pub fn loop_config(mut self, loop_config: LoopConfig) -> Self {
        self.loop_config = loop_config;
        self
    }

    /// Use `clock` instead of the system clock.
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// Hooks notified as the game flow advances.
    pub fn lifecycle(mut self, lifecycle: impl GameLifecycle + 'static) -> Self {
        self.lifecycle = Some(Box::new(lifecycle));
        self
    }

    /// Bound on the deferred command queue.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Validate the configuration and bring the machine up on `device`.
    ///
    /// Every configuration problem is reported at once.
    pub fn build(self, device: impl Device + 'static) -> Result<Machine, ConfigurationErrors> {
        self.config.validate()?;
        let clock = self.clock.unwrap_or_else(|| Box::new(SystemClock::new()));
        let lifecycle = self.lifecycle.unwrap_or_else(|| Box::new(()));
        Machine::assemble(
            &self.config,
            self.loop_config,
            Box::new(device),
            clock,
            lifecycle,
            self.queue_capacity,
        )
    }
}
