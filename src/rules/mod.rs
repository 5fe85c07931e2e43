//! Rule compiler: turns "flippers live" into board-resident switch rules.
//!
//! Flipper and bumper coils must react without a host round trip, so the
//! compiler emits switch→driver rules the board evaluates on its own.
//! [`RuleCompiler::compile`] is pure and returns the full rule set for a
//! given state; [`RuleCompiler::set_enabled`] pushes it to the device.

mod compiler;

pub use compiler::{FlipperTiming, RuleCompiler, RuleInstall};
