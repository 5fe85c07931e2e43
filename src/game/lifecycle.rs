//! Per-game-variant lifecycle callbacks.

use crate::modes::{HandlerError, ModeContext};

/// Callbacks invoked by [`GameFlow`](super::GameFlow) as a game progresses.
///
/// `ctx.game()` already reflects the new status when a hook runs. Every hook
/// defaults to doing nothing.
pub trait GameLifecycle: Send {
    fn on_game_started(&mut self, _ctx: &mut ModeContext<'_>) -> Result<(), HandlerError> {
        Ok(())
    }

    fn on_ball_starting(&mut self, _ctx: &mut ModeContext<'_>) -> Result<(), HandlerError> {
        Ok(())
    }

    fn on_ball_ended(&mut self, _ctx: &mut ModeContext<'_>) -> Result<(), HandlerError> {
        Ok(())
    }

    /// The current player had an extra ball and plays again.
    fn on_shoot_again(&mut self, _ctx: &mut ModeContext<'_>) -> Result<(), HandlerError> {
        Ok(())
    }

    fn on_game_ended(&mut self, _ctx: &mut ModeContext<'_>) -> Result<(), HandlerError> {
        Ok(())
    }

    fn on_update_lamps(&mut self, _ctx: &mut ModeContext<'_>) -> Result<(), HandlerError> {
        Ok(())
    }
}

impl GameLifecycle for () {}
