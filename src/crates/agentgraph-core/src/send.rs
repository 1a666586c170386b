//! Dynamic dispatch records for parallel fan-out
//!
//! A parallel operator does not update state; it emits one [`Send`] per
//! sibling invocation. Each send carries an isolated copy of the state as its
//! payload, so siblings never observe each other's writes mid-flight -
//! their updates merge back through the reducers when they complete.

use crate::graph::NodeId;
use serde_json::Value;

/// A `(target, state-payload)` pair emitted by a parallel operator.
#[derive(Debug, Clone)]
pub struct Send {
    /// Node to invoke.
    pub target: NodeId,

    /// Isolated state snapshot the sibling runs against. For dynamic
    /// fan-out this includes `parallel_item` and `parallel_index`.
    pub payload: Value,
}

impl Send {
    pub fn new(target: impl Into<NodeId>, payload: Value) -> Self {
        Self {
            target: target.into(),
            payload,
        }
    }
}
