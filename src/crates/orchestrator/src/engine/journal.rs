//! Durable run journal
//!
//! Writes execution steps to the entity store and snapshots to the
//! checkpoint store. When both live in the same database (the default), the
//! step close and the snapshot commit in a single transaction; with a split
//! checkpoint store the snapshot is written first, so a crash between the
//! two writes leaves a resumable snapshot and a step that re-closes on
//! retry.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use agentgraph_core::error::{GraphError, Result};
use agentgraph_core::journal::RunJournal;

use crate::db::repositories::now;
use crate::db::DatabasePool;

/// `RunJournal` over the `execution_steps` and `checkpoints` tables.
pub struct SqliteRunJournal {
    pool: DatabasePool,
    checkpoint_pool: DatabasePool,
    /// Whether both pools point at the same database.
    shared: bool,
}

impl SqliteRunJournal {
    pub fn new(pool: DatabasePool, checkpoint_pool: DatabasePool, shared: bool) -> Self {
        Self {
            pool,
            checkpoint_pool,
            shared,
        }
    }

    /// Journal over a single shared database.
    pub fn shared(pool: DatabasePool) -> Self {
        Self {
            checkpoint_pool: pool.clone(),
            pool,
            shared: true,
        }
    }
}

fn storage_err(err: sqlx::Error) -> GraphError {
    GraphError::Execution(format!("journal write failed: {}", err))
}

#[async_trait]
impl RunJournal for SqliteRunJournal {
    async fn step_started(
        &self,
        execution_id: Uuid,
        node_id: &str,
        input: &Value,
    ) -> Result<Uuid> {
        let step_id = Uuid::new_v4();
        let input_data = if input.is_null() {
            None
        } else {
            Some(serde_json::to_string(input)?)
        };

        sqlx::query(
            "INSERT INTO execution_steps (id, execution_id, node_id, status, input_data, started_at)
             VALUES (?, ?, ?, 'running', ?, ?)",
        )
        .bind(step_id.to_string())
        .bind(execution_id.to_string())
        .bind(node_id)
        .bind(input_data)
        .bind(now())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(step_id)
    }

    async fn step_completed(
        &self,
        step_id: Uuid,
        output: &Value,
        soft_error: Option<&str>,
        thread_id: &str,
        step_index: u64,
        snapshot: &Value,
    ) -> Result<()> {
        let output_data = serde_json::to_string(output)?;
        let snapshot_data = serde_json::to_string(snapshot)?;
        let timestamp = now();

        if self.shared {
            let mut tx = self.pool.begin().await.map_err(storage_err)?;
            sqlx::query(
                "UPDATE execution_steps
                 SET status = 'completed', output_data = ?, error_message = ?, completed_at = ?
                 WHERE id = ?",
            )
            .bind(&output_data)
            .bind(soft_error)
            .bind(&timestamp)
            .bind(step_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;

            sqlx::query(
                "INSERT OR REPLACE INTO checkpoints (thread_id, step_index, state, created_at)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(thread_id)
            .bind(step_index as i64)
            .bind(&snapshot_data)
            .bind(&timestamp)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;

            tx.commit().await.map_err(storage_err)?;
        } else {
            // Snapshot first: it is idempotent, the step close is the commit
            // point.
            sqlx::query(
                "INSERT OR REPLACE INTO checkpoints (thread_id, step_index, state, created_at)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(thread_id)
            .bind(step_index as i64)
            .bind(&snapshot_data)
            .bind(&timestamp)
            .execute(&self.checkpoint_pool)
            .await
            .map_err(storage_err)?;

            sqlx::query(
                "UPDATE execution_steps
                 SET status = 'completed', output_data = ?, error_message = ?, completed_at = ?
                 WHERE id = ?",
            )
            .bind(&output_data)
            .bind(soft_error)
            .bind(&timestamp)
            .bind(step_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        }

        Ok(())
    }

    async fn step_failed(&self, step_id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE execution_steps
             SET status = 'failed', error_message = ?, completed_at = ?
             WHERE id = ?",
        )
        .bind(error)
        .bind(now())
        .bind(step_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn step_cancelled(&self, step_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE execution_steps SET status = 'cancelled', completed_at = ? WHERE id = ?",
        )
        .bind(now())
        .bind(step_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        CheckpointRepository, ExecutionRepository, WorkflowRepository,
    };
    use crate::db::schema;
    use serde_json::json;

    async fn setup() -> (DatabasePool, Uuid) {
        let pool = crate::db::connect("sqlite::memory:").await.unwrap();
        schema::create_all(&pool).await.unwrap();
        let workflow = WorkflowRepository::create(&pool, "wf", None, None, false)
            .await
            .unwrap();
        let execution = ExecutionRepository::create(&pool, &workflow.id, "t1", None)
            .await
            .unwrap();
        (pool.clone(), execution.id.parse().unwrap())
    }

    #[tokio::test]
    async fn test_step_and_snapshot_commit_together() {
        let (pool, execution_id) = setup().await;
        let journal = SqliteRunJournal::shared(pool.clone());

        let step = journal
            .step_started(execution_id, "a", &Value::Null)
            .await
            .unwrap();
        journal
            .step_completed(step, &json!({"output": "x"}), None, "t1", 1, &json!({"s": 1}))
            .await
            .unwrap();

        let steps = ExecutionRepository::steps_for(&pool, &execution_id.to_string())
            .await
            .unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].status, "completed");
        assert!(steps[0].input_data.is_none());

        let checkpoint = CheckpointRepository::load_latest(&pool, "t1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(checkpoint.step_index, 1);
    }

    #[tokio::test]
    async fn test_soft_error_recorded_on_completed_step() {
        let (pool, execution_id) = setup().await;
        let journal = SqliteRunJournal::shared(pool.clone());

        let step = journal
            .step_started(execution_id, "r", &Value::Null)
            .await
            .unwrap();
        journal
            .step_completed(step, &json!({}), Some("condition error"), "t1", 1, &json!({}))
            .await
            .unwrap();

        let steps = ExecutionRepository::steps_for(&pool, &execution_id.to_string())
            .await
            .unwrap();
        assert_eq!(steps[0].status, "completed");
        assert_eq!(steps[0].error_message.as_deref(), Some("condition error"));
    }

    #[tokio::test]
    async fn test_failed_step() {
        let (pool, execution_id) = setup().await;
        let journal = SqliteRunJournal::shared(pool.clone());

        let step = journal
            .step_started(execution_id, "b", &Value::Null)
            .await
            .unwrap();
        journal.step_failed(step, "provider exploded").await.unwrap();

        let steps = ExecutionRepository::steps_for(&pool, &execution_id.to_string())
            .await
            .unwrap();
        assert_eq!(steps[0].status, "failed");
        assert_eq!(steps[0].error_message.as_deref(), Some("provider exploded"));
    }
}
