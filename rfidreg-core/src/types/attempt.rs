//! Registration attempt states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// State of the registration coordinator.
///
/// ```text
/// IDLE -> ARMED -> (SCANNED | TIMED_OUT | CANCELLED | READER_ERROR)
/// ```
///
/// The terminal states are kept until the next attempt arms the reader so
/// status queries can report how the last attempt ended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    /// No attempt has run yet
    #[default]
    Idle,
    /// Reader armed, waiting for a tag
    Armed,
    /// A tag was scanned (the bind itself may still have been rejected)
    Scanned,
    /// No tag arrived before the deadline
    TimedOut,
    /// Aborted by the caller
    Cancelled,
    /// Reader hardware fault
    ReaderError,
}

impl AttemptState {
    /// Returns true for the states that end an attempt.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptState::Idle | AttemptState::Armed)
    }
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttemptState::Idle => "idle",
            AttemptState::Armed => "armed",
            AttemptState::Scanned => "scanned",
            AttemptState::TimedOut => "timed_out",
            AttemptState::Cancelled => "cancelled",
            AttemptState::ReaderError => "reader_error",
        };
        f.write_str(s)
    }
}
