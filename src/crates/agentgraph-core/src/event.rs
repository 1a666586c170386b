//! Typed execution events
//!
//! The executor writes events to an in-process channel; the HTTP layer
//! drains it and frames each event for SSE. Consumers receive every event
//! exactly once in emission order, but only from the moment they subscribe -
//! polling clients reconstruct earlier progress from the step table instead.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Events emitted during one execution, in emission order. The final event
/// is `ExecutionComplete` on success or `Error` on failure; a cancelled
/// execution ends the stream without a terminal event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutionEvent {
    ExecutionStarted {
        execution_id: Uuid,
        thread_id: String,
    },
    NodeStart {
        node_id: String,
    },
    NodeComplete {
        node_id: String,
        /// The node's partial state update, not the full state.
        output: Value,
    },
    ExecutionComplete {
        execution_id: Uuid,
        output: Value,
    },
    Error {
        execution_id: Uuid,
        error: String,
    },
}

impl ExecutionEvent {
    /// Event kind string used as the SSE `event:` field.
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionEvent::ExecutionStarted { .. } => "execution_started",
            ExecutionEvent::NodeStart { .. } => "node_start",
            ExecutionEvent::NodeComplete { .. } => "node_complete",
            ExecutionEvent::ExecutionComplete { .. } => "execution_complete",
            ExecutionEvent::Error { .. } => "error",
        }
    }

    /// Payload object without the kind tag, used as the SSE `data:` field.
    pub fn payload(&self) -> Value {
        match self {
            ExecutionEvent::ExecutionStarted {
                execution_id,
                thread_id,
            } => json!({"execution_id": execution_id, "thread_id": thread_id}),
            ExecutionEvent::NodeStart { node_id } => json!({"node_id": node_id}),
            ExecutionEvent::NodeComplete { node_id, output } => {
                json!({"node_id": node_id, "output": output})
            }
            ExecutionEvent::ExecutionComplete {
                execution_id,
                output,
            } => json!({"execution_id": execution_id, "output": output}),
            ExecutionEvent::Error {
                execution_id,
                error,
            } => json!({"execution_id": execution_id, "error": error}),
        }
    }

    /// Whether this event closes the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionEvent::ExecutionComplete { .. } | ExecutionEvent::Error { .. }
        )
    }
}

/// Sending half of the execution event channel. Unbounded: the executor must
/// never block on a slow consumer, and event volume is bounded by step count.
pub type EventSender = mpsc::UnboundedSender<ExecutionEvent>;

/// Receiving half of the execution event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<ExecutionEvent>;

/// Create a fresh event channel.
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_payload() {
        let id = Uuid::new_v4();
        let event = ExecutionEvent::NodeComplete {
            node_id: "summarize".to_string(),
            output: json!({"output": "done"}),
        };
        assert_eq!(event.kind(), "node_complete");
        assert_eq!(event.payload()["node_id"], "summarize");

        let error = ExecutionEvent::Error {
            execution_id: id,
            error: "boom".to_string(),
        };
        assert!(error.is_terminal());
        assert_eq!(error.payload()["error"], "boom");
    }

    #[test]
    fn test_serialized_tag() {
        let event = ExecutionEvent::NodeStart {
            node_id: "a".to_string(),
        };
        let encoded = serde_json::to_value(&event).unwrap();
        assert_eq!(encoded["event"], "node_start");
    }
}
