//! Checkpoint blob repository
//!
//! One row per `(thread_id, step_index)`; `INSERT OR REPLACE` keeps retried
//! saves idempotent.

use crate::db::repositories::now;
use crate::db::DatabasePool;

/// Raw checkpoint row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CheckpointRow {
    pub thread_id: String,
    pub step_index: i64,
    pub state: String,
    pub created_at: String,
}

/// Database operations for checkpoint snapshots.
pub struct CheckpointRepository;

impl CheckpointRepository {
    pub async fn save(
        pool: &DatabasePool,
        thread_id: &str,
        step_index: i64,
        state: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT OR REPLACE INTO checkpoints (thread_id, step_index, state, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(thread_id)
        .bind(step_index)
        .bind(state)
        .bind(now())
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn load_latest(
        pool: &DatabasePool,
        thread_id: &str,
    ) -> Result<Option<CheckpointRow>, sqlx::Error> {
        sqlx::query_as::<_, CheckpointRow>(
            "SELECT * FROM checkpoints WHERE thread_id = ?
             ORDER BY step_index DESC LIMIT 1",
        )
        .bind(thread_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete_thread(
        pool: &DatabasePool,
        thread_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM checkpoints WHERE thread_id = ?")
            .bind(thread_id)
            .execute(pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;

    async fn setup_db() -> DatabasePool {
        let pool = crate::db::connect("sqlite::memory:").await.unwrap();
        schema::create_checkpoint_tables(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_save_and_load_latest() {
        let pool = setup_db().await;
        CheckpointRepository::save(&pool, "t1", 1, r#"{"step": 1}"#)
            .await
            .unwrap();
        CheckpointRepository::save(&pool, "t1", 2, r#"{"step": 2}"#)
            .await
            .unwrap();

        let latest = CheckpointRepository::load_latest(&pool, "t1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.step_index, 2);
        assert_eq!(latest.state, r#"{"step": 2}"#);
    }

    #[tokio::test]
    async fn test_repeat_write_replaces() {
        let pool = setup_db().await;
        CheckpointRepository::save(&pool, "t1", 1, "first").await.unwrap();
        CheckpointRepository::save(&pool, "t1", 1, "second").await.unwrap();

        let latest = CheckpointRepository::load_latest(&pool, "t1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.state, "second");
    }

    #[tokio::test]
    async fn test_delete_thread() {
        let pool = setup_db().await;
        CheckpointRepository::save(&pool, "t1", 1, "{}").await.unwrap();
        CheckpointRepository::delete_thread(&pool, "t1").await.unwrap();
        assert!(CheckpointRepository::load_latest(&pool, "t1")
            .await
            .unwrap()
            .is_none());
    }
}
