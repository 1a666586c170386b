//! Tool repository

use crate::db::models::ToolRow;
use crate::db::repositories::{new_id, now};
use crate::db::DatabasePool;

/// Database operations for tools.
pub struct ToolRepository;

impl ToolRepository {
    pub async fn create(
        pool: &DatabasePool,
        name: &str,
        description: Option<&str>,
        function_schema: &str,
        implementation_ref: &str,
        config: Option<&str>,
    ) -> Result<ToolRow, sqlx::Error> {
        let timestamp = now();
        sqlx::query_as::<_, ToolRow>(
            "INSERT INTO tools (id, name, description, function_schema, implementation_ref, config, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(new_id())
        .bind(name)
        .bind(description)
        .bind(function_schema)
        .bind(implementation_ref)
        .bind(config)
        .bind(&timestamp)
        .bind(&timestamp)
        .fetch_one(pool)
        .await
    }

    pub async fn get_by_id(pool: &DatabasePool, id: &str) -> Result<Option<ToolRow>, sqlx::Error> {
        sqlx::query_as::<_, ToolRow>("SELECT * FROM tools WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_name(
        pool: &DatabasePool,
        name: &str,
    ) -> Result<Option<ToolRow>, sqlx::Error> {
        sqlx::query_as::<_, ToolRow>("SELECT * FROM tools WHERE name = ?")
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &DatabasePool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ToolRow>, sqlx::Error> {
        sqlx::query_as::<_, ToolRow>("SELECT * FROM tools ORDER BY name LIMIT ? OFFSET ?")
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    pub async fn count(pool: &DatabasePool) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tools")
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }

    pub async fn update(
        pool: &DatabasePool,
        id: &str,
        name: &str,
        description: Option<&str>,
        function_schema: &str,
        implementation_ref: &str,
        config: Option<&str>,
    ) -> Result<Option<ToolRow>, sqlx::Error> {
        sqlx::query_as::<_, ToolRow>(
            "UPDATE tools
             SET name = ?, description = ?, function_schema = ?, implementation_ref = ?,
                 config = ?, updated_at = ?
             WHERE id = ?
             RETURNING *",
        )
        .bind(name)
        .bind(description)
        .bind(function_schema)
        .bind(implementation_ref)
        .bind(config)
        .bind(now())
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &DatabasePool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tools WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
