//! Pinstack: the runtime core of a pinball machine controller
//!
//! Pinstack turns debounced switch transitions from a control board into
//! application behavior. Latency-critical reactions (flippers, bumpers) are
//! compiled into rules the board executes on its own; everything else is
//! routed through a priority-ordered stack of modes.
//!
//! # Core Concepts
//!
//! - **Switches and drivers**: named, numbered hardware points kept in
//!   [`core::SwitchStore`] and [`core::DriverBank`]
//! - **Modes**: prioritized bundles of switch handlers, including handlers
//!   that fire only after a level has been held for some time
//! - **Rules**: board-resident switch → driver reactions compiled by
//!   [`rules::RuleCompiler`]
//! - **Run loop**: [`runtime::Machine`] sources events, dispatches them and
//!   applies commands posted from other threads
//!
//! # Example
//!
//! ```rust
//! use pinstack::config::{MachineConfig, MachineType, SwitchConfig};
//! use pinstack::core::{Event, ManualClock, Wiring};
//! use pinstack::device::SimulatedDevice;
//! use pinstack::game::GameRequest;
//! use pinstack::modes::{Mode, SwitchCondition, SwitchOutcome};
//! use pinstack::runtime::Machine;
//!
//! let mut config = MachineConfig::new(MachineType::Wpc);
//! config.switches.push(SwitchConfig {
//!     name: "start".to_string(),
//!     number: 13,
//!     wiring: Wiring::NormallyOpen,
//!     tags: Vec::new(),
//! });
//!
//! let device = SimulatedDevice::new();
//! let mut machine = Machine::builder(config)
//!     .clock(ManualClock::new())
//!     .build(device.clone())
//!     .unwrap();
//!
//! let mut attract = Mode::new("attract", 10, ());
//! attract.on("start", SwitchCondition::Active, |_, _, ctx| {
//!     ctx.request_game(GameRequest::StartGame);
//!     ctx.request_game(GameRequest::AddPlayer);
//!     ctx.request_game(GameRequest::StartBall);
//!     ctx.remove_self();
//!     Ok(SwitchOutcome::Stop)
//! });
//! machine.add_mode(attract).unwrap();
//!
//! machine.process_event(Event::switch_closed(13)).unwrap();
//! assert!(machine.game().in_progress);
//! assert!(machine.modes().is_empty());
//! ```

pub mod config;
pub mod core;
pub mod device;
pub mod game;
pub mod modes;
pub mod rules;
pub mod runtime;

// Re-export commonly used types
pub use config::{ConfigurationError, ConfigurationErrors, LoopConfig, MachineConfig};
pub use core::{Event, Switch, SwitchStore};
pub use device::{Device, DeviceFault, SimulatedDevice};
pub use game::{GameLifecycle, GameRequest, GameStatus};
pub use modes::{Mode, ModeBuilder, ModeContext, ModeId, SwitchCondition, SwitchOutcome};
pub use runtime::{DeferredCommandQueue, LoopExit, LoopReport, Machine, StopHandle};
