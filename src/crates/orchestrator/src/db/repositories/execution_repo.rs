//! Execution repository
//!
//! Status transitions enforce the execution FSM at the storage layer:
//! `started_at` is written exactly once, on the first move out of
//! `pending`; `completed_at` exactly once, on the terminal transition.

use agentgraph_core::ExecutionStatus;

use crate::db::models::{ExecutionRow, ExecutionStepRow};
use crate::db::repositories::{new_id, now};
use crate::db::DatabasePool;

/// Database operations for executions and their steps.
pub struct ExecutionRepository;

impl ExecutionRepository {
    pub async fn create(
        pool: &DatabasePool,
        workflow_id: &str,
        thread_id: &str,
        input_data: Option<&str>,
    ) -> Result<ExecutionRow, sqlx::Error> {
        sqlx::query_as::<_, ExecutionRow>(
            "INSERT INTO executions (id, workflow_id, thread_id, status, input_data, created_at)
             VALUES (?, ?, ?, 'pending', ?, ?)
             RETURNING *",
        )
        .bind(new_id())
        .bind(workflow_id)
        .bind(thread_id)
        .bind(input_data)
        .bind(now())
        .fetch_one(pool)
        .await
    }

    pub async fn get_by_id(
        pool: &DatabasePool,
        id: &str,
    ) -> Result<Option<ExecutionRow>, sqlx::Error> {
        sqlx::query_as::<_, ExecutionRow>("SELECT * FROM executions WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &DatabasePool,
        workflow_id: Option<&str>,
        status: Option<ExecutionStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<ExecutionRow>, i64), sqlx::Error> {
        let workflow_filter = workflow_id.unwrap_or("");
        let status_filter = status.map(|s| s.as_str().to_string()).unwrap_or_default();

        let rows = sqlx::query_as::<_, ExecutionRow>(
            "SELECT * FROM executions
             WHERE (? = '' OR workflow_id = ?) AND (? = '' OR status = ?)
             ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(workflow_filter)
        .bind(workflow_filter)
        .bind(&status_filter)
        .bind(&status_filter)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM executions
             WHERE (? = '' OR workflow_id = ?) AND (? = '' OR status = ?)",
        )
        .bind(workflow_filter)
        .bind(workflow_filter)
        .bind(&status_filter)
        .bind(&status_filter)
        .fetch_one(pool)
        .await?;

        Ok((rows, total.0))
    }

    /// `pending -> running`; sets `started_at` exactly once.
    pub async fn mark_running(pool: &DatabasePool, id: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE executions
             SET status = 'running',
                 started_at = COALESCE(started_at, ?),
                 error_message = NULL,
                 completed_at = NULL
             WHERE id = ?",
        )
        .bind(now())
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// `running -> completed`; writes the output and the terminal timestamp.
    pub async fn mark_completed(
        pool: &DatabasePool,
        id: &str,
        output_data: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE executions
             SET status = 'completed', output_data = ?, error_message = NULL, completed_at = ?
             WHERE id = ?",
        )
        .bind(output_data)
        .bind(now())
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// `running -> failed`.
    pub async fn mark_failed(
        pool: &DatabasePool,
        id: &str,
        error_message: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE executions
             SET status = 'failed', error_message = ?, output_data = NULL, completed_at = ?
             WHERE id = ?",
        )
        .bind(error_message)
        .bind(now())
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// `pending | running -> cancelled`.
    pub async fn mark_cancelled(pool: &DatabasePool, id: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE executions SET status = 'cancelled', completed_at = ? WHERE id = ?",
        )
        .bind(now())
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn delete(pool: &DatabasePool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM executions WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Steps in dispatch order.
    pub async fn steps_for(
        pool: &DatabasePool,
        execution_id: &str,
    ) -> Result<Vec<ExecutionStepRow>, sqlx::Error> {
        sqlx::query_as::<_, ExecutionStepRow>(
            "SELECT * FROM execution_steps WHERE execution_id = ? ORDER BY rowid",
        )
        .bind(execution_id)
        .fetch_all(pool)
        .await
    }

    /// Last node with a completed step; resume rebuilds the frontier from
    /// its outgoing edges.
    pub async fn last_completed_node(
        pool: &DatabasePool,
        execution_id: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT node_id FROM execution_steps
             WHERE execution_id = ? AND status = 'completed'
             ORDER BY rowid DESC LIMIT 1",
        )
        .bind(execution_id)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|r| r.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::WorkflowRepository;
    use crate::db::schema;

    async fn setup() -> (DatabasePool, String) {
        let pool = crate::db::connect("sqlite::memory:").await.unwrap();
        schema::create_all(&pool).await.unwrap();
        let workflow = WorkflowRepository::create(&pool, "wf", None, None, false)
            .await
            .unwrap();
        (pool, workflow.id)
    }

    #[tokio::test]
    async fn test_lifecycle_timestamps() {
        let (pool, workflow_id) = setup().await;
        let execution = ExecutionRepository::create(&pool, &workflow_id, "t1", Some("{}"))
            .await
            .unwrap();
        assert_eq!(execution.status, "pending");
        assert!(execution.started_at.is_none());

        ExecutionRepository::mark_running(&pool, &execution.id)
            .await
            .unwrap();
        let running = ExecutionRepository::get_by_id(&pool, &execution.id)
            .await
            .unwrap()
            .unwrap();
        let started_at = running.started_at.clone().unwrap();

        // A second mark_running (resume) must not move started_at.
        ExecutionRepository::mark_running(&pool, &execution.id)
            .await
            .unwrap();
        let still_running = ExecutionRepository::get_by_id(&pool, &execution.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(still_running.started_at.as_deref(), Some(started_at.as_str()));

        ExecutionRepository::mark_completed(&pool, &execution.id, r#"{"output": 1}"#)
            .await
            .unwrap();
        let done = ExecutionRepository::get_by_id(&pool, &execution.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.status, "completed");
        assert!(done.completed_at.is_some());
        assert!(done.output_data.is_some());
        assert!(done.error_message.is_none());
    }

    #[tokio::test]
    async fn test_failed_clears_output() {
        let (pool, workflow_id) = setup().await;
        let execution = ExecutionRepository::create(&pool, &workflow_id, "t2", None)
            .await
            .unwrap();
        ExecutionRepository::mark_running(&pool, &execution.id)
            .await
            .unwrap();
        ExecutionRepository::mark_failed(&pool, &execution.id, "boom")
            .await
            .unwrap();

        let failed = ExecutionRepository::get_by_id(&pool, &execution.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(failed.status, "failed");
        assert_eq!(failed.error_message.as_deref(), Some("boom"));
        assert!(failed.output_data.is_none());
    }

    #[tokio::test]
    async fn test_list_filters() {
        let (pool, workflow_id) = setup().await;
        for thread in ["a", "b"] {
            let execution = ExecutionRepository::create(&pool, &workflow_id, thread, None)
                .await
                .unwrap();
            ExecutionRepository::mark_running(&pool, &execution.id)
                .await
                .unwrap();
        }

        let (rows, total) = ExecutionRepository::list(
            &pool,
            Some(&workflow_id),
            Some(ExecutionStatus::Running),
            20,
            0,
        )
        .await
        .unwrap();
        assert_eq!(total, 2);
        assert_eq!(rows.len(), 2);

        let (none, total) =
            ExecutionRepository::list(&pool, None, Some(ExecutionStatus::Failed), 20, 0)
                .await
                .unwrap();
        assert_eq!(total, 0);
        assert!(none.is_empty());
    }
}
