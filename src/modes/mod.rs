//! Modes and the priority stack that dispatches switch transitions to them.
//!
//! A [`Mode`] binds handlers to `(switch, condition)` pairs, optionally with
//! a hold time. The [`ModeStack`] walks live modes from highest priority to
//! lowest for each transition; a handler returning [`SwitchOutcome::Stop`]
//! ends the walk after its mode. Held handlers wait in a [`TimedScheduler`]
//! and are dropped as soon as their switch leaves the level.
//!
//! Callbacks get a [`ModeContext`]. Stack and game changes made through it
//! are applied after the current dispatch, never during it.
//!
//! # Example
//!
//! ```rust
//! use pinstack::modes::{ModeBuilder, ModeHooks, SwitchCondition, SwitchOutcome};
//!
//! #[derive(Default)]
//! struct Attract {
//!     presses: u32,
//! }
//!
//! impl ModeHooks for Attract {}
//!
//! let mode = ModeBuilder::new(Attract::default())
//!     .name("attract")
//!     .priority(10)
//!     .on("start", SwitchCondition::Active, |attract, _switch, _ctx| {
//!         attract.presses += 1;
//!         Ok(SwitchOutcome::Stop)
//!     })
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(mode.name(), "attract");
//! ```

mod builder;
mod context;
mod error;
mod handler;
mod mode;
mod stack;
mod timed;

pub use builder::ModeBuilder;
pub use context::ModeContext;
pub(crate) use context::Request;
pub use error::BuildError;
pub use handler::{
    Binding, BindingId, FaultReason, HandlerError, HandlerFault, HandlerResult, SwitchCondition,
    SwitchOutcome,
};
pub use mode::{Mode, ModeHooks, ModeId, StackedMode, SwitchHandler};
pub(crate) use stack::panic_message;
pub use stack::{DispatchReport, ModeStack};
pub use timed::{Obligation, TimedScheduler};
