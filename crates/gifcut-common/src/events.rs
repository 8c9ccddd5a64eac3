//! Application event system.
//!
//! [`EventBus`] wraps a `tokio::sync::broadcast` channel with a bounded
//! ring-buffer of recent events so that late subscribers (a status view
//! opened mid-batch, for instance) can catch up.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::ids::{MediaId, TaskId};

/// Maximum number of events retained in the ring buffer.
const MAX_RECENT_EVENTS: usize = 100;

// ---------------------------------------------------------------------------
// EventPayload
// ---------------------------------------------------------------------------

/// Payload describing what happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    // -- Intake --------------------------------------------------------------
    MediaRegistered {
        media_id: MediaId,
        name: String,
    },
    MediaDurationResolved {
        media_id: MediaId,
        duration: f64,
    },
    MediaRemoved {
        media_id: MediaId,
    },

    // -- Toolkit -------------------------------------------------------------
    ToolkitLoadProgress {
        progress: u8,
    },
    ToolkitLoadSlow,
    ToolkitLoaded,
    ToolkitLoadFailed {
        error: String,
    },

    // -- Batch ---------------------------------------------------------------
    BatchStarted {
        total: usize,
    },
    BatchFinished {
        completed: usize,
        failed: usize,
    },
    TaskQueued {
        task_id: TaskId,
        media_id: MediaId,
    },
    TaskStarted {
        task_id: TaskId,
    },
    TaskProgress {
        task_id: TaskId,
        progress: u8,
    },
    TaskCompleted {
        task_id: TaskId,
        output_size: usize,
    },
    TaskFailed {
        task_id: TaskId,
        error: String,
    },

    // -- Settings ------------------------------------------------------------
    SettingsChanged,
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A timestamped event ready for broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: Uuid,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub payload: EventPayload,
}

impl Event {
    /// Create a new event with a fresh UUID and the current timestamp.
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Broadcast channel with a bounded ring buffer of recent events.
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    recent: RwLock<VecDeque<Event>>,
}

impl EventBus {
    /// Create a new event bus.
    ///
    /// `capacity` controls the broadcast channel buffer size (not the ring
    /// buffer, which is always [`MAX_RECENT_EVENTS`]).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            recent: RwLock::new(VecDeque::with_capacity(MAX_RECENT_EVENTS)),
        }
    }

    /// Subscribe to the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Broadcast an event to all current subscribers and store it in the
    /// ring buffer.
    pub fn broadcast(&self, payload: EventPayload) {
        let event = Event::new(payload);

        {
            let mut recent = self.recent.write();
            if recent.len() >= MAX_RECENT_EVENTS {
                recent.pop_back();
            }
            recent.push_front(event.clone());
        }

        // Ignore send errors (no subscribers).
        let _ = self.tx.send(event);
    }

    /// Return the `n` most recent events (newest first).
    pub fn recent_events(&self, n: usize) -> Vec<Event> {
        let recent = self.recent.read();
        recent.iter().take(n).cloned().collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receivers", &self.tx.receiver_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let task_id = TaskId::new();
        bus.broadcast(EventPayload::TaskStarted { task_id });

        let event = rx.try_recv().unwrap();
        match &event.payload {
            EventPayload::TaskStarted { task_id: received } => assert_eq!(*received, task_id),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn recent_events_capped() {
        let bus = EventBus::new(256);
        for p in 0..150u8 {
            bus.broadcast(EventPayload::ToolkitLoadProgress { progress: p });
        }
        assert_eq!(bus.recent_events(200).len(), MAX_RECENT_EVENTS);
    }

    #[test]
    fn recent_events_newest_first() {
        let bus = EventBus::new(16);
        bus.broadcast(EventPayload::ToolkitLoadProgress { progress: 2 });
        bus.broadcast(EventPayload::ToolkitLoaded);

        let recent = bus.recent_events(1);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].payload, EventPayload::ToolkitLoaded);
    }

    #[test]
    fn no_subscribers_does_not_panic() {
        let bus = EventBus::new(4);
        bus.broadcast(EventPayload::TaskFailed {
            task_id: TaskId::new(),
            error: "test".into(),
        });
    }

    #[test]
    fn payload_tagged_serialization() {
        let json = serde_json::to_value(EventPayload::BatchFinished {
            completed: 2,
            failed: 1,
        })
        .unwrap();
        assert_eq!(json["type"], "batch_finished");
        assert_eq!(json["completed"], 2);
    }
}
