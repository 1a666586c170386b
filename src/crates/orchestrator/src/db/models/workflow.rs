//! Workflow, node, and edge rows
//!
//! Row-to-definition conversion lives here: a [`WorkflowRow`] plus its node
//! and edge rows lower into the core [`WorkflowDef`] the compiler consumes.
//! Join strategy, output key, and fan-out key ride in the node's `config`
//! column; router tables and parallel target lists have their own columns.

use serde::Serialize;
use serde_json::{json, Value};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

use agentgraph_core::graph::{
    EdgeDef, JoinStrategy, NodeDef, NodeKind, RouterConfig, WorkflowDef,
};

use crate::db::error::DatabaseError;
use crate::db::models::decode_json;

/// Workflow definition header.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WorkflowRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// JSON Schema declaring extra state keys.
    pub state_schema: Option<String>,
    pub is_template: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// One node of a workflow.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WorkflowNodeRow {
    pub id: String,
    pub workflow_id: String,
    pub node_id: String,
    pub node_type: String,
    pub agent_id: Option<String>,
    pub router_config: Option<String>,
    pub parallel_nodes: Option<String>,
    pub subgraph_workflow_id: Option<String>,
    pub config: Option<String>,
}

/// One edge of a workflow.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WorkflowEdgeRow {
    pub id: String,
    pub workflow_id: String,
    pub source_node: String,
    pub target_node: String,
    pub condition: Option<String>,
}

impl WorkflowNodeRow {
    /// Lower this row into a typed node definition.
    pub fn to_def(&self) -> Result<NodeDef, DatabaseError> {
        let config = decode_json(&self.config)?.unwrap_or_else(|| json!({}));

        let kind = match self.node_type.as_str() {
            "agent" => {
                let agent_id = self.agent_id.as_deref().ok_or_else(|| {
                    DatabaseError::Corrupt(format!("agent node '{}' has no agent_id", self.node_id))
                })?;
                NodeKind::Agent {
                    agent_id: parse_uuid(agent_id)?,
                }
            }
            "router" => {
                let raw = decode_json(&self.router_config)?.ok_or_else(|| {
                    DatabaseError::Corrupt(format!(
                        "router node '{}' has no router_config",
                        self.node_id
                    ))
                })?;
                let router_config: RouterConfig = serde_json::from_value(raw)?;
                NodeKind::Router { router_config }
            }
            "parallel" => {
                let targets = decode_json(&self.parallel_nodes)?
                    .map(serde_json::from_value::<Vec<String>>)
                    .transpose()?
                    .unwrap_or_default();
                NodeKind::Parallel {
                    parallel_nodes: targets,
                    fan_out_key: config
                        .get("fan_out_key")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                }
            }
            "join" => {
                let strategy = config
                    .get("strategy")
                    .and_then(Value::as_str)
                    .unwrap_or("merge");
                let strategy: JoinStrategy = serde_json::from_value(json!(strategy))?;
                NodeKind::Join {
                    strategy,
                    output_key: config
                        .get("output_key")
                        .and_then(Value::as_str)
                        .unwrap_or("parallel_results")
                        .to_string(),
                }
            }
            "subgraph" => {
                let subgraph_id = self.subgraph_workflow_id.as_deref().ok_or_else(|| {
                    DatabaseError::Corrupt(format!(
                        "subgraph node '{}' has no subgraph_workflow_id",
                        self.node_id
                    ))
                })?;
                NodeKind::Subgraph {
                    subgraph_workflow_id: parse_uuid(subgraph_id)?,
                }
            }
            other => {
                return Err(DatabaseError::Corrupt(format!(
                    "unknown node type '{}'",
                    other
                )))
            }
        };

        Ok(NodeDef {
            node_id: self.node_id.clone(),
            kind,
            config,
        })
    }
}

/// Assemble a complete definition from a workflow row plus its nodes and
/// edges (both in insertion order).
pub fn to_workflow_def(
    workflow: &WorkflowRow,
    nodes: &[WorkflowNodeRow],
    edges: &[WorkflowEdgeRow],
) -> Result<WorkflowDef, DatabaseError> {
    Ok(WorkflowDef {
        id: parse_uuid(&workflow.id)?,
        name: workflow.name.clone(),
        state_schema: decode_json(&workflow.state_schema)?,
        nodes: nodes
            .iter()
            .map(WorkflowNodeRow::to_def)
            .collect::<Result<_, _>>()?,
        edges: edges
            .iter()
            .map(|edge| EdgeDef {
                source_node: edge.source_node.clone(),
                target_node: edge.target_node.clone(),
                condition: edge.condition.clone(),
            })
            .collect(),
        is_template: workflow.is_template,
    })
}

pub(crate) fn parse_uuid(raw: &str) -> Result<Uuid, DatabaseError> {
    Uuid::from_str(raw).map_err(|_| DatabaseError::Corrupt(format!("invalid uuid '{}'", raw)))
}
