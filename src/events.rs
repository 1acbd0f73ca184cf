//! Process-wide event bus.
//!
//! A single `tokio::sync::broadcast` channel multi-producer/multi-subscriber,
//! publishing non-blocking with respect to subscribers.

use serde::Serialize;
use tokio::sync::broadcast;

const MAX_EVENT_SUBSCRIBERS: usize = 256;

/// The single topic this bus carries. There is no multi-topic routing —
/// every event goes to every subscriber.
pub const TOPIC: &str = "zx_emulator_updates_topic";

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoreEvent {
    StateChanged {
        instance_id: String,
        state: String,
    },
    SnapshotApplied {
        instance_id: String,
        format: String,
    },
    BatchCompleted {
        total: usize,
        succeeded: usize,
        failed: usize,
    },
    DiskInserted {
        instance_id: String,
        drive: u8,
    },
    DiskEjected {
        instance_id: String,
        drive: u8,
    },
    TapeStateChanged {
        instance_id: String,
        state: String,
    },
    LogLine {
        level: String,
        source: String,
        msg: String,
        ts: i64,
    },
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(MAX_EVENT_SUBSCRIBERS);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.tx.subscribe()
    }

    /// Send returns `Err` if there are no receivers; that's fine, publishing
    /// must never block on or fail because of subscribers.
    pub fn publish(&self, event: CoreEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
