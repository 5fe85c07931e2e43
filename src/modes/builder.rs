//! Builder for constructing modes.

use super::context::ModeContext;
use super::error::BuildError;
use super::handler::{HandlerResult, SwitchCondition};
use super::mode::{Mode, ModeHooks, SwitchHandler};
use crate::core::Switch;
use std::time::Duration;

struct PendingHandler<S> {
    switch: String,
    condition: SwitchCondition,
    hold: Option<Duration>,
    handler: SwitchHandler<S>,
}

/// Builder for constructing modes with a fluent API.
pub struct ModeBuilder<S: ModeHooks> {
    name: Option<String>,
    priority: i32,
    state: S,
    handlers: Vec<PendingHandler<S>>,
}

impl<S: ModeHooks> ModeBuilder<S> {
    /// Create a new builder around the mode's state.
    pub fn new(state: S) -> Self {
        Self {
            name: None,
            priority: 0,
            state,
            handlers: Vec::new(),
        }
    }

    /// Set the mode name (required).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the stack priority. Higher runs first; defaults to 0.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Add an immediate handler.
    pub fn on<F>(mut self, switch: impl Into<String>, condition: SwitchCondition, handler: F) -> Self
    where
        F: FnMut(&mut S, &Switch, &mut ModeContext<'_>) -> HandlerResult + Send + 'static,
    {
        self.handlers.push(PendingHandler {
            switch: switch.into(),
            condition,
            hold: None,
            handler: Box::new(handler),
        });
        self
    }

    /// Add a handler that fires after `hold` at the level.
    pub fn on_held<F>(
        mut self,
        switch: impl Into<String>,
        condition: SwitchCondition,
        hold: Duration,
        handler: F,
    ) -> Self
    where
        F: FnMut(&mut S, &Switch, &mut ModeContext<'_>) -> HandlerResult + Send + 'static,
    {
        self.handlers.push(PendingHandler {
            switch: switch.into(),
            condition,
            hold: Some(hold),
            handler: Box::new(handler),
        });
        self
    }

    /// Build the mode.
    /// Returns an error if the name is missing or a handler is malformed.
    pub fn build(self) -> Result<Mode<S>, BuildError> {
        let name = self
            .name
            .filter(|name| !name.trim().is_empty())
            .ok_or(BuildError::MissingName)?;

        for (index, pending) in self.handlers.iter().enumerate() {
            if pending.switch.is_empty() {
                return Err(BuildError::EmptySwitchName {
                    mode: name.clone(),
                    index,
                });
            }
            if pending.hold == Some(Duration::ZERO) {
                return Err(BuildError::ZeroHold {
                    switch: pending.switch.clone(),
                });
            }
        }

        let mut mode = Mode::new(name, self.priority, self.state);
        for pending in self.handlers {
            mode.add_switch_handler(pending.switch, pending.condition, pending.hold, pending.handler);
        }
        Ok(mode)
    }
}
