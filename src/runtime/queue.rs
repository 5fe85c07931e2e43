//! Driver commands posted from other threads, applied by the run loop.

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Default number of commands the queue holds between drains.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// A driver command to apply on the next run loop pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeferredCommand {
    Pulse { driver: String, ms: u8 },
    Disable { driver: String },
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum EnqueueError {
    #[error("deferred command queue is full ({capacity} commands)")]
    QueueFull { capacity: usize },
}

/// A bounded, mutex-guarded FIFO of [`DeferredCommand`]s.
///
/// Any thread may enqueue. The run loop drains the whole queue once per
/// iteration; commands enqueued after a drain wait for the next one.
#[derive(Debug)]
pub struct DeferredCommandQueue {
    commands: Mutex<Vec<DeferredCommand>>,
    capacity: usize,
}

impl DeferredCommandQueue {
    /// Empty queue holding at most `capacity` commands.
    pub fn new(capacity: usize) -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            capacity,
        }
    }

    /// Queue a command for the next loop iteration.
    pub fn enqueue(&self, command: DeferredCommand) -> Result<(), EnqueueError> {
        let mut commands = self.lock();
        if commands.len() >= self.capacity {
            return Err(EnqueueError::QueueFull {
                capacity: self.capacity,
            });
        }
        commands.push(command);
        Ok(())
    }

    /// Queue a pulse of `ms` milliseconds.
    pub fn enqueue_pulse(&self, driver: impl Into<String>, ms: u8) -> Result<(), EnqueueError> {
        self.enqueue(DeferredCommand::Pulse {
            driver: driver.into(),
            ms,
        })
    }

    /// Queue a disable.
    pub fn enqueue_disable(&self, driver: impl Into<String>) -> Result<(), EnqueueError> {
        self.enqueue(DeferredCommand::Disable {
            driver: driver.into(),
        })
    }

    /// Take every queued command in enqueue order, leaving the queue empty.
    pub fn drain(&self) -> Vec<DeferredCommand> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // A push cannot be observed half-done, so a poisoned guard is still valid.
    fn lock(&self) -> MutexGuard<'_, Vec<DeferredCommand>> {
        self.commands
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for DeferredCommandQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
