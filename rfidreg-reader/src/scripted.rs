//! In-process reader device driven by code.
//!
//! Tag presentations and faults are queued at runtime and handed out one
//! per poll, the way a physical reader reports whatever is in its field.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use rfidreg_core::error::{RegistryError, Result};
use rfidreg_core::traits::ReaderDevice;
use rfidreg_core::types::TagUid;

/// Something that happens at the reader.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptEvent {
    /// A tag enters the field
    Tag(TagUid),
    /// One request cycle fails
    Fault(String),
}

#[derive(Debug)]
struct ScriptState {
    events: VecDeque<ScriptEvent>,
    connected: bool,
    polls: u64,
    releases: u64,
}

/// Scripted reader device.
///
/// Used by tests and by the CLI's simulation mode.
#[derive(Debug)]
pub struct ScriptedReader {
    state: Mutex<ScriptState>,
}

impl ScriptedReader {
    /// Creates a connected reader with no tag in the field.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ScriptState {
                events: VecDeque::new(),
                connected: true,
                polls: 0,
                releases: 0,
            }),
        }
    }

    /// Creates a reader that will hand out `tags` in order.
    pub fn with_tags(tags: impl IntoIterator<Item = TagUid>) -> Self {
        let reader = Self::new();
        for tag in tags {
            reader.present(tag);
        }
        reader
    }

    /// Queues a tag presentation.
    pub fn present(&self, uid: TagUid) {
        debug!(%uid, "Tag presented to scripted reader");
        self.state.lock().events.push_back(ScriptEvent::Tag(uid));
    }

    /// Queues a single failed request cycle.
    pub fn fail(&self, reason: impl Into<String>) {
        self.state.lock().events.push_back(ScriptEvent::Fault(reason.into()));
    }

    /// Simulates unplugging the reader. Every poll fails until reconnected.
    pub fn disconnect(&self) {
        self.state.lock().connected = false;
    }

    /// Plugs the reader back in.
    pub fn reconnect(&self) {
        self.state.lock().connected = true;
    }

    /// Number of queued events not yet consumed.
    pub fn pending(&self) -> usize {
        self.state.lock().events.len()
    }

    /// Number of request cycles performed so far.
    pub fn poll_count(&self) -> u64 {
        self.state.lock().polls
    }

    /// Number of times a listener released the reader.
    pub fn release_count(&self) -> u64 {
        self.state.lock().releases
    }
}

impl Default for ScriptedReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReaderDevice for ScriptedReader {
    async fn poll(&self) -> Result<Option<TagUid>> {
        let mut state = self.state.lock();
        state.polls += 1;

        if !state.connected {
            return Err(RegistryError::ReaderUnavailable("reader disconnected".into()));
        }

        match state.events.pop_front() {
            Some(ScriptEvent::Tag(uid)) => Ok(Some(uid)),
            Some(ScriptEvent::Fault(reason)) => Err(RegistryError::ReaderUnavailable(reason)),
            None => Ok(None),
        }
    }

    fn release(&self) {
        self.state.lock().releases += 1;
    }

    fn describe(&self) -> String {
        "scripted".into()
    }
}
