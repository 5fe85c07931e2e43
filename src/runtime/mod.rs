//! The run loop and everything that feeds it.
//!
//! [`Machine`] owns the switch store, drivers, mode stack and device. Each
//! [`step`](Machine::step) pulls a batch of device events and dispatches
//! them, ticks modes and held handlers, advances the driver models, applies
//! commands posted to the [`DeferredCommandQueue`] from other threads, and
//! tickles the board watchdog. [`run`](Machine::run) repeats that until a
//! [`StopHandle`] fires or the device fails.

mod builder;
mod machine;
mod queue;
mod report;
mod stop;

pub use builder::MachineBuilder;
pub use machine::{FrameHandler, Machine};
pub use queue::{DeferredCommand, DeferredCommandQueue, EnqueueError, DEFAULT_QUEUE_CAPACITY};
pub use report::{LoopExit, LoopReport, MachineStats};
pub use stop::StopHandle;
