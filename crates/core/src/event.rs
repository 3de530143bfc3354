//! Domain event system — decoupled communication between bounded contexts.
//!
//! Events are published when something interesting happens during a run.
//! Subscribers (the CLI's verbose mode, future dashboards) react without
//! being coupled to the loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A query was classified and a run started
    RunStarted {
        task_id: String,
        mode: String,
        timestamp: DateTime<Utc>,
    },

    /// The model returned a completion
    CompletionReceived {
        task_id: String,
        model: String,
        tokens_used: u32,
        timestamp: DateTime<Utc>,
    },

    /// A tool was invoked
    ToolInvoked {
        task_id: String,
        tool_name: String,
        succeeded: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A checkpoint was persisted
    CheckpointSaved {
        task_id: String,
        steps: usize,
        timestamp: DateTime<Utc>,
    },

    /// A run reached a terminal state ("done", "partial", "failed")
    RunFinished {
        task_id: String,
        status: String,
        iterations: u32,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub. Components
/// subscribe to receive all events and filter for what they care about.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine — drop the event.
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
