//! Workflow definition service
//!
//! Workflow create runs the full validation pipeline before anything is
//! persisted: structural invariants, condition parsing, agent and sub-graph
//! reference checks against the store, and sub-graph inclusion cycle
//! detection over the stored workflow graph.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use uuid::Uuid;

use agentgraph_core::graph::{EdgeDef, NodeDef, NodeKind, WorkflowDef};
use agentgraph_core::validate;

use crate::db::models::WorkflowRow;
use crate::db::repositories::{AgentRepository, WorkflowRepository};
use crate::db::DatabasePool;
use crate::services::{ServiceError, ServiceResult};

/// Request body for creating or replacing a workflow definition.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowCreate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub state_schema: Option<Value>,
    #[serde(default)]
    pub is_template: bool,
    #[serde(default)]
    pub nodes: Vec<NodeCreate>,
    #[serde(default)]
    pub edges: Vec<EdgeCreate>,
}

/// One node in a workflow create request. The tagged layout matches
/// [`NodeKind`]'s serde representation plus the shared fields.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeCreate {
    pub node_id: String,
    #[serde(flatten)]
    pub kind: NodeKind,
    #[serde(default)]
    pub config: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EdgeCreate {
    pub source_node: String,
    pub target_node: String,
    #[serde(default)]
    pub condition: Option<String>,
}

/// Service for workflow definitions.
#[derive(Clone)]
pub struct WorkflowService {
    pool: DatabasePool,
}

impl WorkflowService {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Validate and persist a workflow with its nodes and edges.
    pub async fn create(&self, request: WorkflowCreate) -> ServiceResult<WorkflowRow> {
        let def = request_to_def(Uuid::new_v4(), &request);
        self.validate_definition(&def).await?;

        let state_schema = request
            .state_schema
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let workflow = WorkflowRepository::create(
            &self.pool,
            &request.name,
            request.description.as_deref(),
            state_schema.as_deref(),
            request.is_template,
        )
        .await?;

        for node in &request.nodes {
            let (node_type, agent_id, router_config, parallel_nodes, subgraph_id) =
                node_columns(&node.kind)?;
            let config = stored_config(node)?;
            WorkflowRepository::add_node(
                &self.pool,
                &workflow.id,
                &node.node_id,
                node_type,
                agent_id.as_deref(),
                router_config.as_deref(),
                parallel_nodes.as_deref(),
                subgraph_id.as_deref(),
                config.as_deref(),
            )
            .await?;
        }
        for edge in &request.edges {
            WorkflowRepository::add_edge(
                &self.pool,
                &workflow.id,
                &edge.source_node,
                &edge.target_node,
                edge.condition.as_deref(),
            )
            .await?;
        }

        Ok(workflow)
    }

    /// Full validation pipeline for a definition.
    async fn validate_definition(&self, def: &WorkflowDef) -> ServiceResult<()> {
        validate::validate(def)?;
        validate::validate_conditions(def)?;

        for node in &def.nodes {
            match &node.kind {
                NodeKind::Agent { agent_id } => {
                    let exists =
                        AgentRepository::get_by_id(&self.pool, &agent_id.to_string()).await?;
                    if exists.is_none() {
                        return Err(ServiceError::Validation(format!(
                            "node '{}' references unknown agent {}",
                            node.node_id, agent_id
                        )));
                    }
                }
                NodeKind::Subgraph {
                    subgraph_workflow_id,
                } => {
                    self.check_subgraph_reference(def.id, *subgraph_workflow_id, &node.node_id)
                        .await?;
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Reject a sub-graph reference that is missing or closes an inclusion
    /// cycle through the stored workflow graph.
    async fn check_subgraph_reference(
        &self,
        root: Uuid,
        target: Uuid,
        node_id: &str,
    ) -> ServiceResult<()> {
        if target == root {
            return Err(ServiceError::Validation(format!(
                "node '{}' embeds its own workflow",
                node_id
            )));
        }

        let mut visited: HashSet<Uuid> = HashSet::new();
        let mut stack = vec![target];

        while let Some(current) = stack.pop() {
            if current == root {
                return Err(ServiceError::Validation(format!(
                    "node '{}' closes a sub-graph inclusion cycle",
                    node_id
                )));
            }
            if !visited.insert(current) {
                continue;
            }

            let exists = WorkflowRepository::get_by_id(&self.pool, &current.to_string()).await?;
            if exists.is_none() {
                return Err(ServiceError::Validation(format!(
                    "node '{}' references unknown workflow {}",
                    node_id, current
                )));
            }

            for node in WorkflowRepository::list_nodes(&self.pool, &current.to_string()).await? {
                if node.node_type == "subgraph" {
                    if let Some(next) = &node.subgraph_workflow_id {
                        if let Ok(next) = next.parse() {
                            stack.push(next);
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// Build an in-memory definition from a create request for validation.
fn request_to_def(id: Uuid, request: &WorkflowCreate) -> WorkflowDef {
    WorkflowDef {
        id,
        name: request.name.clone(),
        state_schema: request.state_schema.clone(),
        nodes: request
            .nodes
            .iter()
            .map(|node| NodeDef {
                node_id: node.node_id.clone(),
                kind: node.kind.clone(),
                config: node.config.clone(),
            })
            .collect(),
        edges: request
            .edges
            .iter()
            .map(|edge| EdgeDef {
                source_node: edge.source_node.clone(),
                target_node: edge.target_node.clone(),
                condition: edge.condition.clone(),
            })
            .collect(),
        is_template: request.is_template,
    }
}

/// The config column to persist for a node. Join strategy/output key and
/// the parallel fan-out key are typed fields on the definition but ride in
/// the `config` column at rest, so they are folded in here; the row-to-def
/// conversion reads them back out.
fn stored_config(node: &NodeCreate) -> Result<Option<String>, serde_json::Error> {
    let mut config = match &node.config {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };

    match &node.kind {
        NodeKind::Join {
            strategy,
            output_key,
        } => {
            config.insert("strategy".to_string(), Value::String(strategy.as_str().to_string()));
            config.insert("output_key".to_string(), Value::String(output_key.clone()));
        }
        NodeKind::Parallel {
            fan_out_key: Some(key),
            ..
        } => {
            config.insert("fan_out_key".to_string(), Value::String(key.clone()));
        }
        _ => {}
    }

    if config.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::to_string(&Value::Object(config))?))
    }
}

/// Project a node kind onto its table columns.
#[allow(clippy::type_complexity)]
fn node_columns(
    kind: &NodeKind,
) -> Result<
    (
        &'static str,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
    ),
    serde_json::Error,
> {
    Ok(match kind {
        NodeKind::Agent { agent_id } => {
            ("agent", Some(agent_id.to_string()), None, None, None)
        }
        NodeKind::Router { router_config } => (
            "router",
            None,
            Some(serde_json::to_string(router_config)?),
            None,
            None,
        ),
        NodeKind::Parallel { parallel_nodes, .. } => (
            "parallel",
            None,
            None,
            Some(serde_json::to_string(parallel_nodes)?),
            None,
        ),
        NodeKind::Join { .. } => ("join", None, None, None, None),
        NodeKind::Subgraph {
            subgraph_workflow_id,
        } => (
            "subgraph",
            None,
            None,
            None,
            Some(subgraph_workflow_id.to_string()),
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn setup() -> WorkflowService {
        let pool = crate::db::connect("sqlite::memory:").await.unwrap();
        crate::db::schema::create_all(&pool).await.unwrap();
        WorkflowService::new(pool)
    }

    fn router_request(condition: &str) -> WorkflowCreate {
        serde_json::from_value(json!({
            "name": "routed",
            "nodes": [
                {
                    "node_id": "r",
                    "node_type": "router",
                    "router_config": {
                        "routes": [{"condition": condition, "target": "__end__"}],
                        "default": "__end__",
                    },
                },
            ],
            "edges": [
                {"source_node": "__start__", "target_node": "r"},
                {"source_node": "r", "target_node": "__end__"},
            ],
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_valid_workflow() {
        let service = setup().await;
        let workflow = service
            .create(router_request("state.get('output') == 'yes'"))
            .await
            .unwrap();

        let nodes = WorkflowRepository::list_nodes(&service.pool, &workflow.id)
            .await
            .unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].node_type, "router");
    }

    #[tokio::test]
    async fn test_malformed_condition_rejected() {
        let service = setup().await;
        let err = service
            .create(router_request("state.score >> 0.8"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        // Nothing persisted.
        assert_eq!(WorkflowRepository::count(&service.pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_agent_rejected() {
        let service = setup().await;
        let request: WorkflowCreate = serde_json::from_value(json!({
            "name": "broken",
            "nodes": [
                {"node_id": "a", "node_type": "agent", "agent_id": Uuid::new_v4()},
            ],
            "edges": [
                {"source_node": "__start__", "target_node": "a"},
                {"source_node": "a", "target_node": "__end__"},
            ],
        }))
        .unwrap();

        let err = service.create(request).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unknown_subgraph_reference_rejected() {
        let service = setup().await;
        let request: WorkflowCreate = serde_json::from_value(json!({
            "name": "dangling",
            "nodes": [
                {"node_id": "s", "node_type": "subgraph", "subgraph_workflow_id": Uuid::new_v4()},
            ],
            "edges": [
                {"source_node": "__start__", "target_node": "s"},
                {"source_node": "s", "target_node": "__end__"},
            ],
        }))
        .unwrap();

        let err = service.create(request).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_subgraph_embedding_and_join_config_round_trip() {
        let service = setup().await;
        let inner = service
            .create(router_request("state.get('x') == 1"))
            .await
            .unwrap();

        let outer_request: WorkflowCreate = serde_json::from_value(json!({
            "name": "outer",
            "nodes": [
                {"node_id": "s", "node_type": "subgraph", "subgraph_workflow_id": inner.id},
                {
                    "node_id": "p",
                    "node_type": "parallel",
                    "parallel_nodes": ["s"],
                    "fan_out_key": "items",
                },
                {
                    "node_id": "j",
                    "node_type": "join",
                    "strategy": "list",
                    "output_key": "results",
                },
            ],
            "edges": [
                {"source_node": "__start__", "target_node": "p"},
                {"source_node": "s", "target_node": "j"},
                {"source_node": "j", "target_node": "__end__"},
            ],
        }))
        .unwrap();
        let outer = service.create(outer_request).await.unwrap();

        // Typed join and fan-out parameters survive the config column.
        let nodes = WorkflowRepository::list_nodes(&service.pool, &outer.id)
            .await
            .unwrap();
        let join = nodes.iter().find(|n| n.node_id == "j").unwrap();
        let config: Value = serde_json::from_str(join.config.as_deref().unwrap()).unwrap();
        assert_eq!(config["strategy"], "list");
        assert_eq!(config["output_key"], "results");

        let parallel = nodes.iter().find(|n| n.node_id == "p").unwrap();
        let config: Value = serde_json::from_str(parallel.config.as_deref().unwrap()).unwrap();
        assert_eq!(config["fan_out_key"], "items");
    }
}
