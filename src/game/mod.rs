//! Game flow: starting games, cycling balls and players, extra balls.
//!
//! A single [`GameFlow`] orchestrator owns the progress counters and calls
//! into a per-variant [`GameLifecycle`]. Modes ask for changes with
//! [`ModeContext::request_game`](crate::modes::ModeContext::request_game).

mod flow;
mod lifecycle;

pub use flow::{GameFlow, GameRequest, GameStatus};
pub use lifecycle::GameLifecycle;
