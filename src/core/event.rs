//! Events reported by the device boundary.

use serde::{Deserialize, Serialize};

/// Kind of an [`Event`] pulled from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    None,
    Invalid,
    SwitchClosedDebounced,
    SwitchOpenDebounced,
    SwitchClosedNondebounced,
    SwitchOpenNondebounced,
    FrameDisplayed,
}

impl EventKind {
    /// Electrical level carried by a switch event, `None` for other kinds.
    pub fn switch_level(self) -> Option<bool> {
        match self {
            Self::SwitchClosedDebounced | Self::SwitchClosedNondebounced => Some(true),
            Self::SwitchOpenDebounced | Self::SwitchOpenNondebounced => Some(false),
            Self::None | Self::Invalid | Self::FrameDisplayed => None,
        }
    }
}

/// One event from the device, consumed exactly once by the run loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    /// Switch number for switch events; unused otherwise.
    pub value: u16,
}

impl Event {
    pub fn switch_closed(number: u16) -> Self {
        Self {
            kind: EventKind::SwitchClosedDebounced,
            value: number,
        }
    }

    pub fn switch_open(number: u16) -> Self {
        Self {
            kind: EventKind::SwitchOpenDebounced,
            value: number,
        }
    }

    pub fn frame_displayed() -> Self {
        Self {
            kind: EventKind::FrameDisplayed,
            value: 0,
        }
    }
}
