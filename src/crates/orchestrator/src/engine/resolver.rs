//! Entity-store resolver for the compiler
//!
//! Loads agent rows with their bound tools and a provider handle, and
//! workflow rows (with nodes and edges) as definitions for sub-graph
//! compilation. A tool that fails to resolve is skipped with a warning, the
//! same way the original entity loader treats half-migrated tool rows; a
//! missing provider is a compile-time failure.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use agentgraph_core::error::{GraphError, Result};
use agentgraph_core::graph::WorkflowDef;
use agentgraph_core::plan::{AgentBinding, AgentResolver};
use agentgraph_core::tool::{Tool, ToolRegistry};
use llm::{ProviderConfig, ProviderFactory};

use crate::db::models::workflow::to_workflow_def;
use crate::db::repositories::{AgentRepository, WorkflowRepository};
use crate::db::DatabasePool;

/// Resolver backed by the entity store.
pub struct DbAgentResolver {
    pool: DatabasePool,
    providers: Arc<ProviderFactory>,
    tools: Arc<ToolRegistry>,
}

impl DbAgentResolver {
    pub fn new(
        pool: DatabasePool,
        providers: Arc<ProviderFactory>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            pool,
            providers,
            tools,
        }
    }

    fn storage_err(err: sqlx::Error) -> GraphError {
        GraphError::Execution(format!("entity store read failed: {}", err))
    }
}

#[async_trait]
impl AgentResolver for DbAgentResolver {
    async fn resolve_agent(&self, agent_id: Uuid) -> Result<AgentBinding> {
        let agent = AgentRepository::get_by_id(&self.pool, &agent_id.to_string())
            .await
            .map_err(Self::storage_err)?
            .ok_or(GraphError::NotFound {
                kind: "Agent",
                id: agent_id.to_string(),
            })?;

        let llm_config: ProviderConfig = serde_json::from_str(&agent.llm_config)?;
        let provider = self
            .providers
            .get(&llm_config)
            .map_err(|e| GraphError::Provider(e.to_string()))?;

        let output_schema = agent
            .output_schema
            .as_deref()
            .map(serde_json::from_str::<Value>)
            .transpose()?;

        let tool_rows = AgentRepository::tools_for(&self.pool, &agent.id)
            .await
            .map_err(Self::storage_err)?;
        let mut tools: Vec<Arc<dyn Tool>> = Vec::new();
        for row in tool_rows {
            let config: Value = row
                .config
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?
                .unwrap_or(Value::Null);
            match self.tools.get(&row.implementation_ref, &config) {
                Ok(tool) => tools.push(tool),
                Err(e) => {
                    warn!(
                        agent = %agent.name,
                        tool = %row.name,
                        reference = %row.implementation_ref,
                        "skipping tool that failed to resolve: {}", e
                    );
                }
            }
        }

        Ok(AgentBinding {
            name: agent.name,
            instructions: agent.instructions,
            provider,
            model: llm_config.model,
            max_tokens: llm_config.max_tokens,
            tools,
            output_schema,
        })
    }

    async fn load_workflow(&self, workflow_id: Uuid) -> Result<WorkflowDef> {
        let id = workflow_id.to_string();
        let workflow = WorkflowRepository::get_by_id(&self.pool, &id)
            .await
            .map_err(Self::storage_err)?
            .ok_or(GraphError::NotFound {
                kind: "Workflow",
                id: id.clone(),
            })?;
        let nodes = WorkflowRepository::list_nodes(&self.pool, &id)
            .await
            .map_err(Self::storage_err)?;
        let edges = WorkflowRepository::list_edges(&self.pool, &id)
            .await
            .map_err(Self::storage_err)?;

        to_workflow_def(&workflow, &nodes, &edges)
            .map_err(|e| GraphError::Execution(e.to_string()))
    }
}
