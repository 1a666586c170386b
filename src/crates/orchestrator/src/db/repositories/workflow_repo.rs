//! Workflow repository
//!
//! A workflow exclusively owns its node and edge rows (cascade-delete).
//! Node and edge listings preserve insertion order - conditional edge
//! groups are evaluated in declaration order, so the order rows come back
//! in is semantic.

use crate::db::models::{WorkflowEdgeRow, WorkflowNodeRow, WorkflowRow};
use crate::db::repositories::{new_id, now};
use crate::db::DatabasePool;

/// Database operations for workflow definitions.
pub struct WorkflowRepository;

impl WorkflowRepository {
    pub async fn create(
        pool: &DatabasePool,
        name: &str,
        description: Option<&str>,
        state_schema: Option<&str>,
        is_template: bool,
    ) -> Result<WorkflowRow, sqlx::Error> {
        let timestamp = now();
        sqlx::query_as::<_, WorkflowRow>(
            "INSERT INTO workflows (id, name, description, state_schema, is_template, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(new_id())
        .bind(name)
        .bind(description)
        .bind(state_schema)
        .bind(is_template)
        .bind(&timestamp)
        .bind(&timestamp)
        .fetch_one(pool)
        .await
    }

    pub async fn get_by_id(
        pool: &DatabasePool,
        id: &str,
    ) -> Result<Option<WorkflowRow>, sqlx::Error> {
        sqlx::query_as::<_, WorkflowRow>("SELECT * FROM workflows WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &DatabasePool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WorkflowRow>, sqlx::Error> {
        sqlx::query_as::<_, WorkflowRow>(
            "SELECT * FROM workflows ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn count(pool: &DatabasePool) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM workflows")
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }

    pub async fn update(
        pool: &DatabasePool,
        id: &str,
        name: &str,
        description: Option<&str>,
        state_schema: Option<&str>,
        is_template: bool,
    ) -> Result<Option<WorkflowRow>, sqlx::Error> {
        sqlx::query_as::<_, WorkflowRow>(
            "UPDATE workflows
             SET name = ?, description = ?, state_schema = ?, is_template = ?, updated_at = ?
             WHERE id = ?
             RETURNING *",
        )
        .bind(name)
        .bind(description)
        .bind(state_schema)
        .bind(is_template)
        .bind(now())
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &DatabasePool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // Node sub-resource.

    #[allow(clippy::too_many_arguments)]
    pub async fn add_node(
        pool: &DatabasePool,
        workflow_id: &str,
        node_id: &str,
        node_type: &str,
        agent_id: Option<&str>,
        router_config: Option<&str>,
        parallel_nodes: Option<&str>,
        subgraph_workflow_id: Option<&str>,
        config: Option<&str>,
    ) -> Result<WorkflowNodeRow, sqlx::Error> {
        sqlx::query_as::<_, WorkflowNodeRow>(
            "INSERT INTO workflow_nodes
                 (id, workflow_id, node_id, node_type, agent_id, router_config,
                  parallel_nodes, subgraph_workflow_id, config)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(new_id())
        .bind(workflow_id)
        .bind(node_id)
        .bind(node_type)
        .bind(agent_id)
        .bind(router_config)
        .bind(parallel_nodes)
        .bind(subgraph_workflow_id)
        .bind(config)
        .fetch_one(pool)
        .await
    }

    pub async fn list_nodes(
        pool: &DatabasePool,
        workflow_id: &str,
    ) -> Result<Vec<WorkflowNodeRow>, sqlx::Error> {
        sqlx::query_as::<_, WorkflowNodeRow>(
            "SELECT * FROM workflow_nodes WHERE workflow_id = ? ORDER BY rowid",
        )
        .bind(workflow_id)
        .fetch_all(pool)
        .await
    }

    pub async fn delete_node(
        pool: &DatabasePool,
        workflow_id: &str,
        node_row_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM workflow_nodes WHERE workflow_id = ? AND id = ?")
            .bind(workflow_id)
            .bind(node_row_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // Edge sub-resource.

    pub async fn add_edge(
        pool: &DatabasePool,
        workflow_id: &str,
        source_node: &str,
        target_node: &str,
        condition: Option<&str>,
    ) -> Result<WorkflowEdgeRow, sqlx::Error> {
        sqlx::query_as::<_, WorkflowEdgeRow>(
            "INSERT INTO workflow_edges (id, workflow_id, source_node, target_node, condition)
             VALUES (?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(new_id())
        .bind(workflow_id)
        .bind(source_node)
        .bind(target_node)
        .bind(condition)
        .fetch_one(pool)
        .await
    }

    pub async fn list_edges(
        pool: &DatabasePool,
        workflow_id: &str,
    ) -> Result<Vec<WorkflowEdgeRow>, sqlx::Error> {
        sqlx::query_as::<_, WorkflowEdgeRow>(
            "SELECT * FROM workflow_edges WHERE workflow_id = ? ORDER BY rowid",
        )
        .bind(workflow_id)
        .fetch_all(pool)
        .await
    }

    pub async fn delete_edge(
        pool: &DatabasePool,
        workflow_id: &str,
        edge_row_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM workflow_edges WHERE workflow_id = ? AND id = ?")
            .bind(workflow_id)
            .bind(edge_row_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deep-copy a workflow with its nodes and edges under a fresh id.
    pub async fn clone_workflow(
        pool: &DatabasePool,
        id: &str,
        new_name: &str,
    ) -> Result<Option<WorkflowRow>, sqlx::Error> {
        let Some(original) = Self::get_by_id(pool, id).await? else {
            return Ok(None);
        };
        let nodes = Self::list_nodes(pool, id).await?;
        let edges = Self::list_edges(pool, id).await?;

        let mut tx = pool.begin().await?;
        let timestamp = now();
        let clone_id = new_id();

        let clone = sqlx::query_as::<_, WorkflowRow>(
            "INSERT INTO workflows (id, name, description, state_schema, is_template, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(&clone_id)
        .bind(new_name)
        .bind(&original.description)
        .bind(&original.state_schema)
        .bind(original.is_template)
        .bind(&timestamp)
        .bind(&timestamp)
        .fetch_one(&mut *tx)
        .await?;

        for node in &nodes {
            sqlx::query(
                "INSERT INTO workflow_nodes
                     (id, workflow_id, node_id, node_type, agent_id, router_config,
                      parallel_nodes, subgraph_workflow_id, config)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(new_id())
            .bind(&clone_id)
            .bind(&node.node_id)
            .bind(&node.node_type)
            .bind(&node.agent_id)
            .bind(&node.router_config)
            .bind(&node.parallel_nodes)
            .bind(&node.subgraph_workflow_id)
            .bind(&node.config)
            .execute(&mut *tx)
            .await?;
        }
        for edge in &edges {
            sqlx::query(
                "INSERT INTO workflow_edges (id, workflow_id, source_node, target_node, condition)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(new_id())
            .bind(&clone_id)
            .bind(&edge.source_node)
            .bind(&edge.target_node)
            .bind(&edge.condition)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Some(clone))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;

    async fn setup_db() -> DatabasePool {
        let pool = crate::db::connect("sqlite::memory:").await.unwrap();
        schema::create_all(&pool).await.unwrap();
        pool
    }

    async fn seed_workflow(pool: &DatabasePool) -> WorkflowRow {
        let workflow = WorkflowRepository::create(pool, "pipeline", None, None, false)
            .await
            .unwrap();
        WorkflowRepository::add_node(
            pool,
            &workflow.id,
            "a",
            "router",
            None,
            Some(r#"{"routes": [], "default": "__end__"}"#),
            None,
            None,
            None,
        )
        .await
        .unwrap();
        WorkflowRepository::add_edge(pool, &workflow.id, "__start__", "a", None)
            .await
            .unwrap();
        WorkflowRepository::add_edge(pool, &workflow.id, "a", "__end__", None)
            .await
            .unwrap();
        workflow
    }

    #[tokio::test]
    async fn test_nodes_and_edges_keep_insertion_order() {
        let pool = setup_db().await;
        let workflow = WorkflowRepository::create(&pool, "wf", None, None, false)
            .await
            .unwrap();
        for target in ["high", "mid", "low"] {
            WorkflowRepository::add_edge(&pool, &workflow.id, "r", target, None)
                .await
                .unwrap();
        }

        let edges = WorkflowRepository::list_edges(&pool, &workflow.id)
            .await
            .unwrap();
        let targets: Vec<&str> = edges.iter().map(|e| e.target_node.as_str()).collect();
        assert_eq!(targets, vec!["high", "mid", "low"]);
    }

    #[tokio::test]
    async fn test_unique_node_id_per_workflow() {
        let pool = setup_db().await;
        let workflow = seed_workflow(&pool).await;
        let duplicate = WorkflowRepository::add_node(
            &pool, &workflow.id, "a", "router", None, Some("{}"), None, None, None,
        )
        .await;
        assert!(duplicate.is_err());
    }

    #[tokio::test]
    async fn test_cascade_delete() {
        let pool = setup_db().await;
        let workflow = seed_workflow(&pool).await;

        WorkflowRepository::delete(&pool, &workflow.id).await.unwrap();
        assert!(WorkflowRepository::list_nodes(&pool, &workflow.id)
            .await
            .unwrap()
            .is_empty());
        assert!(WorkflowRepository::list_edges(&pool, &workflow.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_clone_copies_structure() {
        let pool = setup_db().await;
        let workflow = seed_workflow(&pool).await;

        let clone = WorkflowRepository::clone_workflow(&pool, &workflow.id, "pipeline (copy)")
            .await
            .unwrap()
            .unwrap();
        assert_ne!(clone.id, workflow.id);

        let nodes = WorkflowRepository::list_nodes(&pool, &clone.id).await.unwrap();
        let edges = WorkflowRepository::list_edges(&pool, &clone.id).await.unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(edges.len(), 2);
        assert_eq!(nodes[0].node_id, "a");
    }
}
