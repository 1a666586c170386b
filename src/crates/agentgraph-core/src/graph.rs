//! Workflow definition records
//!
//! These are the declarative records the compiler consumes: a workflow is a
//! set of tagged nodes plus edges between them, with the reserved endpoints
//! [`START`] and [`END`]. Definitions round-trip through the entity store as
//! JSON, so everything here derives `Serialize`/`Deserialize`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Node identifier, unique inside a workflow.
pub type NodeId = String;

/// Virtual entry point. Only valid as an edge source.
pub const START: &str = "__start__";

/// Virtual exit point. Only valid as an edge target.
pub const END: &str = "__end__";

/// A workflow definition: nodes, edges, and an optional state schema
/// declaring extra state keys beyond the reserved ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDef {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub state_schema: Option<Value>,
    pub nodes: Vec<NodeDef>,
    pub edges: Vec<EdgeDef>,
    #[serde(default)]
    pub is_template: bool,
}

impl WorkflowDef {
    pub fn node(&self, node_id: &str) -> Option<&NodeDef> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }

    /// Edges leaving `source`, in declaration order.
    pub fn edges_from(&self, source: &str) -> Vec<&EdgeDef> {
        self.edges.iter().filter(|e| e.source_node == source).collect()
    }
}

/// A node inside a workflow. `config` is an opaque map; the executor reads
/// `config.timeout_seconds` for the per-node wall-clock budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDef {
    pub node_id: NodeId,
    #[serde(flatten)]
    pub kind: NodeKind,
    #[serde(default)]
    pub config: Value,
}

impl NodeDef {
    pub fn timeout_seconds(&self) -> Option<u64> {
        self.config.get("timeout_seconds").and_then(Value::as_u64)
    }
}

/// Tagged node variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "node_type", rename_all = "snake_case")]
pub enum NodeKind {
    /// Runs an agent's bounded tool-calling loop.
    Agent { agent_id: Uuid },

    /// Picks one outgoing route by evaluating conditions against state.
    Router { router_config: RouterConfig },

    /// Fans out to `parallel_nodes`; with `fan_out_key` set, one dispatch per
    /// item of the list stored under that state key.
    Parallel {
        parallel_nodes: Vec<NodeId>,
        #[serde(default)]
        fan_out_key: Option<String>,
    },

    /// Aggregates sibling results from `intermediate` into `output_key`.
    Join {
        strategy: JoinStrategy,
        output_key: String,
    },

    /// Embeds another workflow as a single node.
    Subgraph { subgraph_workflow_id: Uuid },
}

impl NodeKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::Agent { .. } => "agent",
            NodeKind::Router { .. } => "router",
            NodeKind::Parallel { .. } => "parallel",
            NodeKind::Join { .. } => "join",
            NodeKind::Subgraph { .. } => "subgraph",
        }
    }
}

/// Routing table of a router node: conditions tried in declaration order,
/// with a fallback target when none matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    pub routes: Vec<RouteRule>,
    #[serde(default)]
    pub default: Option<NodeId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRule {
    pub condition: String,
    pub target: NodeId,
}

/// How a join node combines the values collected from its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinStrategy {
    /// Shallow-merge map values; non-maps are wrapped as `{sibling: value}`.
    Merge,
    /// Collect into a list in sibling declaration order.
    List,
    /// String-coerce and join with newlines, skipping nulls.
    Concat,
    /// First non-null value in declaration order.
    First,
}

impl JoinStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinStrategy::Merge => "merge",
            JoinStrategy::List => "list",
            JoinStrategy::Concat => "concat",
            JoinStrategy::First => "first",
        }
    }
}

/// A directed edge. Multiple edges from the same source form a conditional
/// group; a condition-less edge in such a group is the group's default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeDef {
    pub source_node: NodeId,
    pub target_node: NodeId,
    #[serde(default)]
    pub condition: Option<String>,
}

impl EdgeDef {
    pub fn direct(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            source_node: source.into(),
            target_node: target.into(),
            condition: None,
        }
    }

    pub fn conditional(
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        condition: impl Into<String>,
    ) -> Self {
        Self {
            source_node: source.into(),
            target_node: target.into(),
            condition: Some(condition.into()),
        }
    }
}
