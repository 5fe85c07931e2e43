//! Switch state store.
//!
//! Holds the last debounced level of every configured switch. The run loop
//! is the only writer; modes receive a shared reference.

use super::registry::{Entity, InsertError, Registry};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a switch is wired, which decides what "active" means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Wiring {
    /// Active when closed.
    #[default]
    #[serde(rename = "NO")]
    NormallyOpen,
    /// Active when open (e.g. opto switches).
    #[serde(rename = "NC")]
    NormallyClosed,
}

/// A logical switch and its last-known debounced level.
#[derive(Debug, Clone, PartialEq)]
pub struct Switch {
    number: u16,
    name: String,
    wiring: Wiring,
    tags: Vec<String>,
    closed: bool,
    last_changed: Duration,
}

impl Switch {
    /// Untagged switch, initially open.
    pub fn new(number: u16, name: impl Into<String>, wiring: Wiring) -> Self {
        Self {
            number,
            name: name.into(),
            wiring,
            tags: Vec::new(),
            closed: false,
            last_changed: Duration::ZERO,
        }
    }

    /// Attach group tags such as `trough`.
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
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

    pub fn wiring(&self) -> Wiring {
        self.wiring
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Whether the switch carries `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Electrical level: `true` when the contacts are closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_open(&self) -> bool {
        !self.closed
    }

    /// Logical level after accounting for the switch wiring.
    pub fn is_active(&self) -> bool {
        match self.wiring {
            Wiring::NormallyOpen => self.closed,
            Wiring::NormallyClosed => !self.closed,
        }
    }

    pub fn is_inactive(&self) -> bool {
        !self.is_active()
    }

    /// Timestamp of the last accepted level change.
    pub fn last_changed(&self) -> Duration {
        self.last_changed
    }

    /// Time spent at the current level.
    pub fn time_since_change(&self, now: Duration) -> Duration {
        now.saturating_sub(self.last_changed)
    }
}

impl Entity for Switch {
    fn number(&self) -> u16 {
        self.number
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Machine-wide switch store.
#[derive(Debug, Clone, Default)]
pub struct SwitchStore {
    switches: Registry<Switch>,
}

impl SwitchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a switch; number and name must be unused.
    pub fn insert(&mut self, switch: Switch) -> Result<(), InsertError> {
        self.switches.insert(switch)
    }

    /// Look a switch up by name.
    pub fn get(&self, name: &str) -> Option<&Switch> {
        self.switches.by_name(name)
    }

    /// Look a switch up by board number.
    pub fn get_by_number(&self, number: u16) -> Option<&Switch> {
        self.switches.get(number)
    }

    /// `true` when the named switch exists and is logically active.
    pub fn is_active(&self, name: &str) -> bool {
        self.get(name).is_some_and(Switch::is_active)
    }

    /// Record a new electrical level and return the previous one.
    ///
    /// Writing the level the switch already has is a no-op: neither the
    /// level nor the change timestamp moves. Returns `None` for an unknown
    /// switch number.
    pub fn set_state(&mut self, number: u16, closed: bool, now: Duration) -> Option<bool> {
        let switch = self.switches.get_mut(number)?;
        let previous = switch.closed;
        if previous != closed {
            switch.closed = closed;
            switch.last_changed = now;
        }
        Some(previous)
    }

    /// All switches carrying `tag`, in configuration order.
    pub fn tagged<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Switch> + 'a {
        self.switches.iter().filter(move |s| s.has_tag(tag))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Switch> {
        self.switches.iter()
    }

    pub fn len(&self) -> usize {
        self.switches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.switches.is_empty()
    }
}
