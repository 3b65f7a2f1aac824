//! Run lifecycle events — the interface to the presentation layer.
//!
//! The step loop emits these as plain structured events; formatting and
//! display are entirely the subscriber's concern.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Events emitted over the course of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// A new step is starting
    StepStarted { step: u32 },

    /// A tool call is being routed through the dispatch gate
    ToolDispatched {
        step: u32,
        call_id: String,
        tool: String,
    },

    /// A dispatch attempt finished (any outcome kind)
    ToolCompleted {
        step: u32,
        call_id: String,
        tool: String,
        outcome: String,
        duration_ms: u64,
    },

    /// The detector classified the step as anomalous and a recovery
    /// message was injected
    AnomalyWarned {
        step: u32,
        class: String,
        consecutive: u32,
    },

    /// The circuit breaker escalated to its single critical intervention
    CircuitOpened { step: u32 },

    /// The run reached a terminal outcome
    RunCompleted {
        reason: String,
        steps: u32,
        tools_executed: u32,
    },
}

impl RunEvent {
    /// Short name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StepStarted { .. } => "step_started",
            Self::ToolDispatched { .. } => "tool_dispatched",
            Self::ToolCompleted { .. } => "tool_completed",
            Self::AnomalyWarned { .. } => "anomaly_warned",
            Self::CircuitOpened { .. } => "circuit_opened",
            Self::RunCompleted { .. } => "run_completed",
        }
    }
}

/// A broadcast-based event bus for run events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub. Publishing
/// with no subscribers is fine.
pub struct EventBus {
    sender: broadcast::Sender<Arc<RunEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: RunEvent) {
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<RunEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(RunEvent::ToolCompleted {
            step: 1,
            call_id: "call_1".into(),
            tool: "read_file".into(),
            outcome: "success".into(),
            duration_ms: 42,
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            RunEvent::ToolCompleted { tool, outcome, .. } => {
                assert_eq!(tool, "read_file");
                assert_eq!(outcome, "success");
            }
            _ => panic!("Expected ToolCompleted event"),
        }
    }

    #[test]
    fn no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(RunEvent::CircuitOpened { step: 3 });
    }

    #[test]
    fn event_serialization() {
        let event = RunEvent::AnomalyWarned {
            step: 2,
            class: "pseudo_call".into(),
            consecutive: 1,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"anomaly_warned""#));
        assert_eq!(event.event_type(), "anomaly_warned");
    }
}
