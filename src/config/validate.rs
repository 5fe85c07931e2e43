//! Whole-document validation.
//!
//! Uses `stillwater::Validation` so one pass reports every problem instead of
//! stopping at the first.

use super::{ConfigurationError, ConfigurationErrors, FlipperFamily, MachineConfig};
use std::collections::HashSet;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

type Check = Validation<(), NonEmptyVec<ConfigurationError>>;

fn check(ok: bool, error: impl FnOnce() -> ConfigurationError) -> Check {
    if ok {
        Validation::success(())
    } else {
        Validation::fail(error())
    }
}

fn unique<'a>(
    kind: &'static str,
    items: impl Iterator<Item = (&'a str, u16)>,
    checks: &mut Vec<Check>,
) -> HashSet<&'a str> {
    let mut names = HashSet::new();
    let mut numbers = HashSet::new();
    for (name, number) in items {
        checks.push(check(!name.is_empty(), || ConfigurationError::EmptyName {
            kind,
            number,
        }));
        checks.push(check(names.insert(name), || ConfigurationError::DuplicateName {
            kind,
            name: name.to_string(),
        }));
        checks.push(check(numbers.insert(number), || {
            ConfigurationError::DuplicateNumber { kind, number }
        }));
    }
    names
}

/// Check that `name` is a configured switch.
pub(crate) fn require_switch(names: &HashSet<&str>, name: &str, referenced_by: &str) -> Check {
    check(names.contains(name), || ConfigurationError::MissingSwitch {
        name: name.to_string(),
        referenced_by: referenced_by.to_string(),
    })
}

/// Check that `name` is a configured driver.
pub(crate) fn require_driver(names: &HashSet<&str>, name: &str, referenced_by: &str) -> Check {
    check(names.contains(name), || ConfigurationError::MissingDriver {
        name: name.to_string(),
        referenced_by: referenced_by.to_string(),
    })
}

/// Fold accumulated checks into a `Result`.
pub(crate) fn finish(checks: Vec<Check>) -> Result<(), ConfigurationErrors> {
    match Validation::all_vec(checks).map(|_| ()) {
        Validation::Success(()) => Ok(()),
        Validation::Failure(errors) => Err(ConfigurationErrors(errors.iter().cloned().collect())),
    }
}

impl MachineConfig {
    /// Check the document, reporting every problem found.
    pub fn validate(&self) -> Result<(), ConfigurationErrors> {
        let mut checks = Vec::new();

        let switches = unique(
            "switch",
            self.switches.iter().map(|s| (s.name.as_str(), s.number)),
            &mut checks,
        );
        let drivers = unique(
            "driver",
            self.coils
                .iter()
                .chain(self.lamps.iter())
                .map(|d| (d.name.as_str(), d.number)),
            &mut checks,
        );

        checks.push(check(self.game.num_balls > 0, || ConfigurationError::NoBalls));
        checks.push(check(self.game.balls_per_game > 0, || {
            ConfigurationError::NoBallsPerGame
        }));

        let family = self.machine_type.flipper_family();
        for flipper in &self.flippers {
            let context = format!("flipper '{flipper}'");
            checks.push(require_switch(&switches, flipper, &context));
            checks.push(require_driver(&drivers, &format!("{flipper}Main"), &context));
            if family == FlipperFamily::DualCoil {
                checks.push(require_driver(&drivers, &format!("{flipper}Hold"), &context));
            }
        }

        for bumper in &self.bumpers {
            let context = format!("bumper '{bumper}'");
            checks.push(require_switch(&switches, bumper, &context));
            checks.push(require_driver(&drivers, bumper, &context));
            if let Some(coil) = self.coils.iter().find(|coil| &coil.name == bumper) {
                checks.push(check(coil.pulse_ms > 0, || {
                    ConfigurationError::ZeroBumperPulse {
                        name: bumper.clone(),
                    }
                }));
            }
        }

        if let Some(relay) = &self.flipper_relay {
            checks.push(require_driver(&drivers, relay, "flipper relay"));
        }

        finish(checks)
    }
}
