//! The game orchestrator: balls, players and extra balls.

use super::lifecycle::GameLifecycle;
use crate::device::DeviceFault;
use crate::modes::{panic_message, FaultReason, HandlerError, ModeContext};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

/// Snapshot of game progress, as seen by callbacks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStatus {
    /// Current ball, 1-based. 0 when no game is running.
    pub ball: u32,
    pub balls_per_game: u32,
    pub players: u32,
    /// Index of the player up, 0-based.
    pub current_player: u32,
    pub in_progress: bool,
    pub ball_started_at: Option<Duration>,
}

impl GameStatus {
    /// Whether the current ball is the last regulation ball.
    pub fn is_last_ball(&self) -> bool {
        self.in_progress && self.ball >= self.balls_per_game
    }
}

/// A game-flow change requested by a mode or the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameRequest {
    StartGame,
    AddPlayer,
    StartBall,
    EndBall,
    EndGame,
    /// Give the current player one extra ball.
    AwardExtraBall,
    UpdateLamps,
}

#[derive(Debug, Clone, Copy)]
enum Hook {
    GameStarted,
    BallStarting,
    BallEnded,
    ShootAgain,
    GameEnded,
    UpdateLamps,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::GameStarted => "on_game_started",
            Self::BallStarting => "on_ball_starting",
            Self::BallEnded => "on_ball_ended",
            Self::ShootAgain => "on_shoot_again",
            Self::GameEnded => "on_game_ended",
            Self::UpdateLamps => "on_update_lamps",
        };
        f.write_str(name)
    }
}

/// Drives a [`GameLifecycle`] through start, balls, extra balls and end.
pub struct GameFlow {
    status: GameStatus,
    extra_balls: Vec<u32>,
    lifecycle: Box<dyn GameLifecycle>,
}

impl GameFlow {
    pub fn new(balls_per_game: u32, lifecycle: Box<dyn GameLifecycle>) -> Self {
        Self {
            status: GameStatus {
                balls_per_game,
                ..GameStatus::default()
            },
            extra_balls: Vec::new(),
            lifecycle,
        }
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    /// Extra balls banked by `player`.
    pub fn extra_balls(&self, player: u32) -> u32 {
        self.extra_balls.get(player as usize).copied().unwrap_or(0)
    }

    /// Apply `request`, running lifecycle hooks through `ctx`.
    ///
    /// Hook errors are logged. Device faults are returned.
    pub fn apply(&mut self, request: GameRequest, ctx: &mut ModeContext<'_>) -> Result<(), DeviceFault> {
        log::debug!("game request {request:?}");
        match request {
            GameRequest::StartGame => self.start_game(ctx),
            GameRequest::AddPlayer => {
                self.add_player();
                ctx.set_game(self.status);
                Ok(())
            }
            GameRequest::StartBall => self.start_ball(ctx),
            GameRequest::EndBall => self.end_ball(ctx),
            GameRequest::EndGame => self.end_game(ctx),
            GameRequest::AwardExtraBall => {
                self.award_extra_ball();
                Ok(())
            }
            GameRequest::UpdateLamps => self.notify(Hook::UpdateLamps, ctx),
        }
    }

    /// Return to the no-game state without running hooks.
    pub fn reset(&mut self) {
        self.status = GameStatus {
            balls_per_game: self.status.balls_per_game,
            ..GameStatus::default()
        };
        self.extra_balls.clear();
    }

    fn start_game(&mut self, ctx: &mut ModeContext<'_>) -> Result<(), DeviceFault> {
        if self.status.in_progress {
            log::warn!("starting a game while one is in progress; restarting");
        }
        self.status.ball = 1;
        self.status.players = 0;
        self.status.current_player = 0;
        self.status.ball_started_at = None;
        self.status.in_progress = true;
        self.extra_balls.clear();
        self.notify(Hook::GameStarted, ctx)
    }

    fn add_player(&mut self) {
        if !self.status.in_progress {
            log::warn!("ignoring add player with no game in progress");
            return;
        }
        self.status.players += 1;
        self.extra_balls.push(0);
    }

    fn start_ball(&mut self, ctx: &mut ModeContext<'_>) -> Result<(), DeviceFault> {
        if !self.status.in_progress {
            log::warn!("ignoring start ball with no game in progress");
            return Ok(());
        }
        self.status.ball_started_at = Some(ctx.now());
        self.notify(Hook::BallStarting, ctx)
    }

    fn end_ball(&mut self, ctx: &mut ModeContext<'_>) -> Result<(), DeviceFault> {
        if !self.status.in_progress {
            log::warn!("ignoring end ball with no game in progress");
            return Ok(());
        }
        if let Some(started) = self.status.ball_started_at {
            log::debug!(
                "ball {} lasted {}ms",
                self.status.ball,
                ctx.now().saturating_sub(started).as_millis()
            );
        }
        self.notify(Hook::BallEnded, ctx)?;

        let player = self.status.current_player as usize;
        if let Some(extra) = self.extra_balls.get_mut(player).filter(|extra| **extra > 0) {
            *extra -= 1;
            log::debug!("player {} shoots again", player + 1);
            self.status.ball_started_at = Some(ctx.now());
            return self.notify(Hook::ShootAgain, ctx);
        }

        if self.status.current_player + 1 >= self.status.players.max(1) {
            self.status.ball += 1;
            self.status.current_player = 0;
            log::debug!("next ball: {}", self.status.ball);
        } else {
            self.status.current_player += 1;
        }

        if self.status.ball > self.status.balls_per_game {
            self.end_game(ctx)
        } else {
            self.start_ball(ctx)
        }
    }

    fn end_game(&mut self, ctx: &mut ModeContext<'_>) -> Result<(), DeviceFault> {
        if !self.status.in_progress {
            return Ok(());
        }
        self.status.in_progress = false;
        self.status.ball_started_at = None;
        let result = self.notify(Hook::GameEnded, ctx);
        self.status.ball = 0;
        ctx.set_game(self.status);
        result
    }

    fn award_extra_ball(&mut self) {
        match self.extra_balls.get_mut(self.status.current_player as usize) {
            Some(extra) => *extra += 1,
            None => log::warn!("no current player to award an extra ball to"),
        }
    }

    fn notify(&mut self, hook: Hook, ctx: &mut ModeContext<'_>) -> Result<(), DeviceFault> {
        ctx.set_game(self.status);
        let lifecycle = self.lifecycle.as_mut();
        let result = panic::catch_unwind(AssertUnwindSafe(|| match hook {
            Hook::GameStarted => lifecycle.on_game_started(ctx),
            Hook::BallStarting => lifecycle.on_ball_starting(ctx),
            Hook::BallEnded => lifecycle.on_ball_ended(ctx),
            Hook::ShootAgain => lifecycle.on_shoot_again(ctx),
            Hook::GameEnded => lifecycle.on_game_ended(ctx),
            Hook::UpdateLamps => lifecycle.on_update_lamps(ctx),
        }));

        let reason = match result {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(HandlerError::Device(fault))) => return Err(fault),
            Ok(Err(error)) => FaultReason::Error(error),
            Err(payload) => FaultReason::Panicked(panic_message(payload.as_ref())),
        };
        log::error!("game lifecycle {hook} faulted: {reason}");
        Ok(())
    }
}
