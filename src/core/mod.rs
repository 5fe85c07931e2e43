//! Machine state the engine owns outright.
//!
//! - Switches and their debounced levels
//! - Drivers and the host-side model of their outputs
//! - Board events and the shared clock
//!
//! Switches and drivers each live in a single dual-indexed arena
//! ([`Registry`]), looked up by board number or by configuration name.

mod clock;
mod driver;
mod event;
mod registry;
mod switch;

pub use clock::{Clock, ManualClock, SystemClock};
pub use driver::{Driver, DriverBank, DriverError, DriverStatus, SCHEDULE_SLOTS};
pub use event::{Event, EventKind};
pub use registry::{Entity, InsertError, Registry};
pub use switch::{Switch, SwitchStore, Wiring};
