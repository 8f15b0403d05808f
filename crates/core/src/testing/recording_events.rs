//! Event sink that keeps everything it is given.

use std::sync::Mutex;

use crate::events::{EventSink, RunState, SyncEvent};

#[derive(Debug, Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<SyncEvent>>,
}

impl RecordingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SyncEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// `(state, success)` of every sync state event, in order.
    pub fn sync_states(&self) -> Vec<(RunState, Option<bool>)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SyncEvent::SyncState { state, success } => Some((state, success)),
                _ => None,
            })
            .collect()
    }

    /// Number of events of the given kind.
    pub fn count(&self, kind: &str) -> usize {
        self.events().iter().filter(|e| e.kind() == kind).count()
    }
}

impl EventSink for RecordingEvents {
    fn publish(&self, event: SyncEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}
