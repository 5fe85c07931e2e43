//! Flipper and bumper rule compilation.

use crate::config::{
    ConfigurationError, ConfigurationErrors, FlipperFamily, LoopConfig, MachineConfig,
};
use crate::core::{Driver, DriverBank, Switch, SwitchStore};
use crate::device::{Device, DeviceFault, DriverDirective, RuleOptions, RuleTrigger};
use std::time::Duration;

/// Coil timings used when compiling flipper rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlipperTiming {
    /// Main coil pulse (dual-coil) or initial full-power pulse (single-coil).
    pub pulse_ms: u8,
    pub patter_on_ms: u8,
    pub patter_off_ms: u8,
}

impl Default for FlipperTiming {
    fn default() -> Self {
        Self::from(&LoopConfig::default())
    }
}

impl From<&LoopConfig> for FlipperTiming {
    fn from(config: &LoopConfig) -> Self {
        Self {
            pulse_ms: config.flipper_pulse_ms,
            patter_on_ms: config.patter_on_ms,
            patter_off_ms: config.patter_off_ms,
        }
    }
}

/// One rule write destined for the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleInstall {
    pub switch: u16,
    pub trigger: RuleTrigger,
    pub options: RuleOptions,
    /// Empty means "remove".
    pub directives: Vec<DriverDirective>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Flipper {
    switch: u16,
    main: u16,
    hold: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Bumper {
    switch: u16,
    coil: u16,
    pulse_ms: u8,
}

const FLIPPER_OPTIONS: RuleOptions = RuleOptions {
    notify_host: false,
    reload_active: false,
};

const BUMPER_OPTIONS: RuleOptions = RuleOptions {
    notify_host: false,
    reload_active: true,
};

/// Compiles and installs flipper/bumper rules for one machine.
///
/// Every referenced name is resolved at construction, so a missing switch
/// or coil stops bring-up instead of surfacing mid-game.
#[derive(Debug, Clone)]
pub struct RuleCompiler {
    family: FlipperFamily,
    timing: FlipperTiming,
    flippers: Vec<Flipper>,
    bumpers: Vec<Bumper>,
    relay: Option<u16>,
    enabled: bool,
}

impl RuleCompiler {
    pub fn new(
        config: &MachineConfig,
        switches: &SwitchStore,
        drivers: &DriverBank,
        timing: FlipperTiming,
    ) -> Result<Self, ConfigurationErrors> {
        let family = config.machine_type.flipper_family();
        let mut errors = Vec::new();

        let switch_number = |name: &str, referenced_by: &str, errors: &mut Vec<ConfigurationError>| {
            let found = switches.get(name).map(Switch::number);
            if found.is_none() {
                errors.push(ConfigurationError::MissingSwitch {
                    name: name.to_string(),
                    referenced_by: referenced_by.to_string(),
                });
            }
            found
        };
        let driver = |name: &str, referenced_by: &str, errors: &mut Vec<ConfigurationError>| {
            let found = drivers.get(name);
            if found.is_none() {
                errors.push(ConfigurationError::MissingDriver {
                    name: name.to_string(),
                    referenced_by: referenced_by.to_string(),
                });
            }
            found
        };

        let mut flippers = Vec::new();
        for name in &config.flippers {
            let context = format!("flipper '{name}'");
            let switch = switch_number(name, &context, &mut errors);
            let main = driver(&format!("{name}Main"), &context, &mut errors);
            let hold = match family {
                FlipperFamily::DualCoil => driver(&format!("{name}Hold"), &context, &mut errors)
                    .map(|d| Some(d.number())),
                FlipperFamily::SingleCoilPattern => Some(None),
            };
            if let (Some(switch), Some(main), Some(hold)) = (switch, main, hold) {
                flippers.push(Flipper {
                    switch,
                    main: main.number(),
                    hold,
                });
            }
        }

        let mut bumpers = Vec::new();
        for name in &config.bumpers {
            let context = format!("bumper '{name}'");
            let switch = switch_number(name, &context, &mut errors);
            let coil = driver(name, &context, &mut errors);
            if let (Some(switch), Some(coil)) = (switch, coil) {
                bumpers.push(Bumper {
                    switch,
                    coil: coil.number(),
                    pulse_ms: coil.pulse_ms(),
                });
            }
        }

        let relay = match &config.flipper_relay {
            Some(name) => driver(name, "flipper relay", &mut errors).map(Driver::number),
            None => None,
        };

        if !errors.is_empty() {
            return Err(ConfigurationErrors(errors));
        }

        Ok(Self {
            family,
            timing,
            flippers,
            bumpers,
            relay,
            enabled: false,
        })
    }

    /// Whether the rules are currently installed.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn family(&self) -> FlipperFamily {
        self.family
    }

    /// The complete rule set for the given state, in install order.
    pub fn compile(&self, enable: bool) -> Vec<RuleInstall> {
        let mut rules = Vec::with_capacity(self.flippers.len() * 2 + self.bumpers.len());

        for flipper in &self.flippers {
            let (on_close, on_open) = if enable {
                self.flipper_directives(flipper)
            } else {
                (Vec::new(), Vec::new())
            };
            rules.push(RuleInstall {
                switch: flipper.switch,
                trigger: RuleTrigger::ClosedNondebounced,
                options: FLIPPER_OPTIONS,
                directives: on_close,
            });
            rules.push(RuleInstall {
                switch: flipper.switch,
                trigger: RuleTrigger::OpenNondebounced,
                options: FLIPPER_OPTIONS,
                directives: on_open,
            });
        }

        for bumper in &self.bumpers {
            let directives = if enable {
                vec![DriverDirective::pulse(bumper.coil, bumper.pulse_ms)]
            } else {
                Vec::new()
            };
            rules.push(RuleInstall {
                switch: bumper.switch,
                trigger: RuleTrigger::ClosedNondebounced,
                options: BUMPER_OPTIONS,
                directives,
            });
        }

        rules
    }

    fn flipper_directives(&self, flipper: &Flipper) -> (Vec<DriverDirective>, Vec<DriverDirective>) {
        match (self.family, flipper.hold) {
            (FlipperFamily::DualCoil, Some(hold)) => (
                vec![
                    DriverDirective::pulse(flipper.main, self.timing.pulse_ms),
                    DriverDirective::hold(hold),
                ],
                vec![
                    DriverDirective::disable(flipper.main),
                    DriverDirective::disable(hold),
                ],
            ),
            _ => (
                vec![DriverDirective::patter(
                    flipper.main,
                    self.timing.patter_on_ms,
                    self.timing.patter_off_ms,
                    self.timing.pulse_ms,
                )],
                vec![DriverDirective::disable(flipper.main)],
            ),
        }
    }

    /// Turn flippers and bumpers on or off.
    ///
    /// Enabling while already enabled touches nothing. Disabling always
    /// rewrites the rules as removals and forces every flipper coil off,
    /// so no output can be left stuck on. Returns whether rules were written.
    pub fn set_enabled(
        &mut self,
        enable: bool,
        device: &mut dyn Device,
        drivers: &mut DriverBank,
        now: Duration,
    ) -> Result<bool, DeviceFault> {
        if enable && self.enabled {
            return Ok(false);
        }

        log::debug!("setting flippers enabled to {enable}");
        for rule in self.compile(enable) {
            device.install_switch_rule(
                rule.switch,
                rule.trigger,
                rule.options,
                &rule.directives,
                false,
            )?;
        }

        if !enable {
            for flipper in &self.flippers {
                drivers.disable_number(device, flipper.main, now)?;
                if let Some(hold) = flipper.hold {
                    drivers.disable_number(device, hold, now)?;
                }
            }
        }

        if let Some(relay) = self.relay {
            if enable {
                drivers.hold_number(device, relay, now)?;
            } else {
                drivers.disable_number(device, relay, now)?;
            }
        }

        self.enabled = enable;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DriverConfig, MachineType, SwitchConfig};
    use crate::core::{DriverStatus, Wiring};
    use crate::device::{DriverAction, DriverCall, SimulatedDevice};

    fn config(machine_type: MachineType) -> MachineConfig {
        let switch = |name: &str, number| SwitchConfig {
            name: name.to_string(),
            number,
            wiring: Wiring::NormallyOpen,
            tags: Vec::new(),
        };
        let coil = |name: &str, number, pulse_ms| DriverConfig {
            name: name.to_string(),
            number,
            pulse_ms,
            is_virtual: false,
        };

        let mut config = MachineConfig::new(machine_type);
        config.switches = vec![switch("flipperLwR", 1), switch("jetTop", 2)];
        config.coils = vec![
            coil("flipperLwRMain", 10, 30),
            coil("flipperLwRHold", 11, 30),
            coil("jetTop", 12, 25),
        ];
        config.flippers = vec!["flipperLwR".to_string()];
        config.bumpers = vec!["jetTop".to_string()];
        config
    }

    fn compiler(config: &MachineConfig) -> (RuleCompiler, DriverBank) {
        let switches = config.switch_store().unwrap();
        let drivers = config.driver_bank().unwrap();
        let compiler =
            RuleCompiler::new(config, &switches, &drivers, FlipperTiming::default()).unwrap();
        (compiler, drivers)
    }

    #[test]
    fn dual_coil_enable_pulses_main_and_holds_hold() {
        let (mut compiler, mut drivers) = compiler(&config(MachineType::Wpc));
        let mut device = SimulatedDevice::new();

        compiler
            .set_enabled(true, &mut device, &mut drivers, Duration::ZERO)
            .unwrap();

        let close = device
            .installed_rule(1, RuleTrigger::ClosedNondebounced)
            .unwrap();
        assert_eq!(
            close.directives,
            vec![DriverDirective::pulse(10, 34), DriverDirective::hold(11)]
        );
        assert!(!close.options.reload_active);

        let open = device.installed_rule(1, RuleTrigger::OpenNondebounced).unwrap();
        assert_eq!(
            open.directives,
            vec![DriverDirective::disable(10), DriverDirective::disable(11)]
        );
    }

    #[test]
    fn single_coil_enable_installs_patter() {
        let (mut compiler, mut drivers) = compiler(&config(MachineType::SternWhitestar));
        let mut device = SimulatedDevice::new();

        compiler
            .set_enabled(true, &mut device, &mut drivers, Duration::ZERO)
            .unwrap();

        let close = device
            .installed_rule(1, RuleTrigger::ClosedNondebounced)
            .unwrap();
        assert_eq!(
            close.directives[0].action,
            DriverAction::Patter {
                on_ms: 2,
                off_ms: 18,
                original_on_ms: 34
            }
        );
        assert_eq!(close.directives.len(), 1);
    }

    #[test]
    fn bumper_rule_reloads_and_uses_coil_pulse() {
        let (mut compiler, mut drivers) = compiler(&config(MachineType::Wpc));
        let mut device = SimulatedDevice::new();

        compiler
            .set_enabled(true, &mut device, &mut drivers, Duration::ZERO)
            .unwrap();

        let rule = device
            .installed_rule(2, RuleTrigger::ClosedNondebounced)
            .unwrap();
        assert!(rule.options.reload_active);
        assert_eq!(rule.directives, vec![DriverDirective::pulse(12, 25)]);
    }

    #[test]
    fn enabling_twice_writes_nothing_new() {
        let (mut compiler, mut drivers) = compiler(&config(MachineType::Wpc));
        let mut device = SimulatedDevice::new();

        assert!(compiler
            .set_enabled(true, &mut device, &mut drivers, Duration::ZERO)
            .unwrap());
        let rules = device.installed_rules();
        let writes = device.rule_writes();

        assert!(!compiler
            .set_enabled(true, &mut device, &mut drivers, Duration::ZERO)
            .unwrap());
        assert_eq!(device.installed_rules(), rules);
        assert_eq!(device.rule_writes(), writes);
    }

    #[test]
    fn disable_removes_rules_and_forces_coils_off() {
        let (mut compiler, mut drivers) = compiler(&config(MachineType::Wpc));
        let mut device = SimulatedDevice::new();

        compiler
            .set_enabled(true, &mut device, &mut drivers, Duration::ZERO)
            .unwrap();
        compiler
            .set_enabled(false, &mut device, &mut drivers, Duration::ZERO)
            .unwrap();

        assert!(device.installed_rules().is_empty());
        assert!(!compiler.is_enabled());
        let calls = device.driver_calls();
        assert!(calls.contains(&DriverCall::Disable { driver: 10 }));
        assert!(calls.contains(&DriverCall::Disable { driver: 11 }));
    }

    #[test]
    fn relay_is_held_while_enabled() {
        let mut config = config(MachineType::WpcAlphanumeric);
        config.coils.push(DriverConfig {
            name: "flipperRelay".to_string(),
            number: 79,
            pulse_ms: 30,
            is_virtual: false,
        });
        config.flipper_relay = Some("flipperRelay".to_string());
        let (mut compiler, mut drivers) = compiler(&config);
        let mut device = SimulatedDevice::new();

        compiler
            .set_enabled(true, &mut device, &mut drivers, Duration::ZERO)
            .unwrap();
        assert!(device
            .driver_calls()
            .contains(&DriverCall::Pulse { driver: 79, ms: 0 }));
        assert_eq!(
            drivers.get("flipperRelay").unwrap().status(),
            DriverStatus::Held
        );

        compiler
            .set_enabled(false, &mut device, &mut drivers, Duration::ZERO)
            .unwrap();
        assert_eq!(
            device.driver_calls().last(),
            Some(&DriverCall::Disable { driver: 79 })
        );
        assert_eq!(
            drivers.get("flipperRelay").unwrap().status(),
            DriverStatus::Off
        );
    }

    #[test]
    fn missing_names_fail_construction() {
        let mut config = config(MachineType::Wpc);
        config.flippers.push("flipperUpR".to_string());
        let switches = config.switch_store().unwrap();
        let drivers = config.driver_bank().unwrap();

        let errors =
            RuleCompiler::new(&config, &switches, &drivers, FlipperTiming::default()).unwrap_err();

        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| matches!(
            e,
            ConfigurationError::MissingSwitch { name, .. } if name == "flipperUpR"
        )));
        assert!(errors.to_string().contains("flipperUpRMain"));
        assert!(errors.to_string().contains("flipperUpRHold"));
    }

    #[test]
    fn compile_is_pure_and_removal_rules_are_empty() {
        let (compiler, _) = compiler(&config(MachineType::Wpc));

        let off = compiler.compile(false);
        assert_eq!(off.len(), 3);
        assert!(off.iter().all(|r| r.directives.is_empty()));
        assert_eq!(compiler.compile(true), compiler.compile(true));
    }
}
