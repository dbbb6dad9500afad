use crate::models::{describe_target, Transition};
use crate::state_machine::ExecutionStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Broadcast publisher for execution lifecycle events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

/// Event that has been published
#[derive(Debug, Clone, Serialize)]
pub struct PublishedEvent {
    pub name: String,
    pub execution_id: Option<Uuid>,
    pub context: Value,
    pub published_at: DateTime<Utc>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, name: impl Into<String>, execution_id: Option<Uuid>, context: Value) {
        let event = PublishedEvent {
            name: name.into(),
            execution_id,
            context,
            published_at: Utc::now(),
        };
        let _ = self.sender.send(event);
    }

    /// Publish the append of `transition` together with the status it produced.
    pub fn publish_transition(
        &self,
        name: &str,
        transition: &Transition,
        status: ExecutionStatus,
    ) {
        self.publish(
            name,
            Some(transition.execution_id),
            json!({
                "transition_id": transition.id,
                "type": transition.transition_type,
                "current": describe_target(transition.current.as_ref()),
                "next": describe_target(transition.next.as_ref()),
                "sort_key": transition.sort_key,
                "status": status,
            }),
        );
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000)
    }
}
