//! SQLite checkpoint backend

use async_trait::async_trait;
use serde_json::Value;

use agentgraph_checkpoint::{CheckpointError, Checkpointer, Result, StateSnapshot};

use crate::db::repositories::CheckpointRepository;
use crate::db::schema;
use crate::db::DatabasePool;

/// Checkpointer over the `checkpoints` table.
pub struct SqliteCheckpointer {
    pool: DatabasePool,
}

impl SqliteCheckpointer {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn storage_err(err: sqlx::Error) -> CheckpointError {
    CheckpointError::Storage(err.to_string())
}

#[async_trait]
impl Checkpointer for SqliteCheckpointer {
    async fn setup(&self) -> Result<()> {
        schema::create_checkpoint_tables(&self.pool)
            .await
            .map_err(storage_err)
    }

    async fn save(&self, thread_id: &str, step_index: u64, state: &Value) -> Result<()> {
        let encoded = serde_json::to_string(state)?;
        CheckpointRepository::save(&self.pool, thread_id, step_index as i64, &encoded)
            .await
            .map_err(storage_err)
    }

    async fn load_latest(&self, thread_id: &str) -> Result<Option<StateSnapshot>> {
        let row = CheckpointRepository::load_latest(&self.pool, thread_id)
            .await
            .map_err(storage_err)?;
        row.map(|row| {
            let state: Value = serde_json::from_str(&row.state)?;
            Ok(StateSnapshot::new(
                row.thread_id,
                row.step_index as u64,
                state,
            ))
        })
        .transpose()
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        CheckpointRepository::delete_thread(&self.pool, thread_id)
            .await
            .map_err(storage_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_round_trip() {
        let pool = crate::db::connect("sqlite::memory:").await.unwrap();
        let checkpointer = SqliteCheckpointer::new(pool);
        checkpointer.setup().await.unwrap();

        checkpointer
            .save("t1", 3, &json!({"output": "x"}))
            .await
            .unwrap();
        let snapshot = checkpointer.load_latest("t1").await.unwrap().unwrap();
        assert_eq!(snapshot.step_index, 3);
        assert_eq!(snapshot.state, json!({"output": "x"}));
    }
}
