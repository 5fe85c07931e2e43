//! Modes: named, prioritized bundles of switch handlers with their own state.

use super::context::ModeContext;
use super::handler::{Binding, BindingId, HandlerError, HandlerResult, SwitchCondition};
use crate::core::Switch;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Unique identity of a mode instance.
///
/// Assigned at construction, so two modes with the same name and priority
/// remain distinguishable on the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModeId(Uuid);

impl ModeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ModeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ModeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle callbacks for a mode's state.
///
/// All default to doing nothing.
pub trait ModeHooks: Send + 'static {
    /// Called once when the mode joins the stack.
    fn mode_started(&mut self, _ctx: &mut ModeContext<'_>) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Called once per run loop iteration while the mode is live.
    fn mode_tick(&mut self, _ctx: &mut ModeContext<'_>) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Called once when the mode leaves the stack.
    fn mode_stopped(&mut self, _ctx: &mut ModeContext<'_>) -> Result<(), HandlerError> {
        Ok(())
    }
}

impl ModeHooks for () {}

/// A switch handler over mode state `S`.
pub type SwitchHandler<S> =
    Box<dyn FnMut(&mut S, &Switch, &mut ModeContext<'_>) -> HandlerResult + Send>;

/// A mode with typed state.
pub struct Mode<S> {
    id: ModeId,
    name: String,
    priority: i32,
    state: S,
    table: HashMap<String, Vec<Binding>>,
    handlers: Vec<SwitchHandler<S>>,
}

impl<S: ModeHooks> Mode<S> {
    /// Mode with no handlers and a fresh id.
    pub fn new(name: impl Into<String>, priority: i32, state: S) -> Self {
        Self {
            id: ModeId::new(),
            name: name.into(),
            priority,
            state,
            table: HashMap::new(),
            handlers: Vec::new(),
        }
    }

    pub fn id(&self) -> ModeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// State shared by this mode's handlers.
    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    /// Register `handler` for `switch` reaching `condition`.
    ///
    /// With a non-zero `hold` the handler fires only after the level has
    /// persisted that long; a zero hold is immediate.
    pub fn add_switch_handler<F>(
        &mut self,
        switch: impl Into<String>,
        condition: SwitchCondition,
        hold: Option<Duration>,
        handler: F,
    ) -> BindingId
    where
        F: FnMut(&mut S, &Switch, &mut ModeContext<'_>) -> HandlerResult + Send + 'static,
    {
        let id = BindingId(self.handlers.len());
        let switch = switch.into();
        self.handlers.push(Box::new(handler));
        self.table.entry(switch.clone()).or_default().push(Binding {
            id,
            switch,
            condition,
            hold: hold.filter(|hold| !hold.is_zero()),
        });
        id
    }

    /// Register an immediate handler.
    pub fn on<F>(&mut self, switch: impl Into<String>, condition: SwitchCondition, handler: F) -> BindingId
    where
        F: FnMut(&mut S, &Switch, &mut ModeContext<'_>) -> HandlerResult + Send + 'static,
    {
        self.add_switch_handler(switch, condition, None, handler)
    }

    /// Register a handler that fires once the level has been held for `hold`.
    pub fn on_held<F>(
        &mut self,
        switch: impl Into<String>,
        condition: SwitchCondition,
        hold: Duration,
        handler: F,
    ) -> BindingId
    where
        F: FnMut(&mut S, &Switch, &mut ModeContext<'_>) -> HandlerResult + Send + 'static,
    {
        self.add_switch_handler(switch, condition, Some(hold), handler)
    }

    /// Every binding, in registration order.
    pub fn all_bindings(&self) -> impl Iterator<Item = &Binding> {
        let mut bindings: Vec<&Binding> = self.table.values().flatten().collect();
        bindings.sort_by_key(|binding| binding.id.0);
        bindings.into_iter()
    }
}

impl<S> fmt::Debug for Mode<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Object-safe view of a mode, as held by the stack.
pub trait StackedMode: Send {
    fn id(&self) -> ModeId;

    fn name(&self) -> &str;

    fn priority(&self) -> i32;

    /// Bindings for `switch`, in registration order.
    fn bindings(&self, switch: &str) -> &[Binding];

    fn invoke(
        &mut self,
        binding: BindingId,
        switch: &Switch,
        ctx: &mut ModeContext<'_>,
    ) -> HandlerResult;

    fn started(&mut self, ctx: &mut ModeContext<'_>) -> Result<(), HandlerError>;

    fn tick(&mut self, ctx: &mut ModeContext<'_>) -> Result<(), HandlerError>;

    fn stopped(&mut self, ctx: &mut ModeContext<'_>) -> Result<(), HandlerError>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<S: ModeHooks> StackedMode for Mode<S> {
    fn id(&self) -> ModeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn bindings(&self, switch: &str) -> &[Binding] {
        self.table.get(switch).map(Vec::as_slice).unwrap_or(&[])
    }

    fn invoke(
        &mut self,
        binding: BindingId,
        switch: &Switch,
        ctx: &mut ModeContext<'_>,
    ) -> HandlerResult {
        match self.handlers.get_mut(binding.0) {
            Some(handler) => handler(&mut self.state, switch, ctx),
            None => Err(HandlerError::failed(format!(
                "mode '{}' has no handler {}",
                self.name, binding.0
            ))),
        }
    }

    fn started(&mut self, ctx: &mut ModeContext<'_>) -> Result<(), HandlerError> {
        self.state.mode_started(ctx)
    }

    fn tick(&mut self, ctx: &mut ModeContext<'_>) -> Result<(), HandlerError> {
        self.state.mode_tick(ctx)
    }

    fn stopped(&mut self, ctx: &mut ModeContext<'_>) -> Result<(), HandlerError> {
        self.state.mode_stopped(ctx)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
