//! Agent repository

use crate::db::models::{AgentRow, ToolRow};
use crate::db::repositories::{new_id, now};
use crate::db::DatabasePool;

/// Database operations for agents and their tool bindings.
pub struct AgentRepository;

impl AgentRepository {
    pub async fn create(
        pool: &DatabasePool,
        name: &str,
        description: Option<&str>,
        instructions: &str,
        llm_config: &str,
        output_schema: Option<&str>,
    ) -> Result<AgentRow, sqlx::Error> {
        let timestamp = now();
        sqlx::query_as::<_, AgentRow>(
            "INSERT INTO agents (id, name, description, instructions, llm_config, output_schema, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(new_id())
        .bind(name)
        .bind(description)
        .bind(instructions)
        .bind(llm_config)
        .bind(output_schema)
        .bind(&timestamp)
        .bind(&timestamp)
        .fetch_one(pool)
        .await
    }

    pub async fn get_by_id(
        pool: &DatabasePool,
        id: &str,
    ) -> Result<Option<AgentRow>, sqlx::Error> {
        sqlx::query_as::<_, AgentRow>("SELECT * FROM agents WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &DatabasePool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AgentRow>, sqlx::Error> {
        sqlx::query_as::<_, AgentRow>(
            "SELECT * FROM agents ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn count(pool: &DatabasePool) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM agents")
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }

    pub async fn update(
        pool: &DatabasePool,
        id: &str,
        name: &str,
        description: Option<&str>,
        instructions: &str,
        llm_config: &str,
        output_schema: Option<&str>,
    ) -> Result<Option<AgentRow>, sqlx::Error> {
        sqlx::query_as::<_, AgentRow>(
            "UPDATE agents
             SET name = ?, description = ?, instructions = ?, llm_config = ?,
                 output_schema = ?, updated_at = ?
             WHERE id = ?
             RETURNING *",
        )
        .bind(name)
        .bind(description)
        .bind(instructions)
        .bind(llm_config)
        .bind(output_schema)
        .bind(now())
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &DatabasePool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM agents WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Bind a tool to an agent. Idempotent.
    pub async fn bind_tool(
        pool: &DatabasePool,
        agent_id: &str,
        tool_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT OR IGNORE INTO agent_tools (agent_id, tool_id) VALUES (?, ?)")
            .bind(agent_id)
            .bind(tool_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn unbind_tool(
        pool: &DatabasePool,
        agent_id: &str,
        tool_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM agent_tools WHERE agent_id = ? AND tool_id = ?")
            .bind(agent_id)
            .bind(tool_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Tools bound to an agent.
    pub async fn tools_for(
        pool: &DatabasePool,
        agent_id: &str,
    ) -> Result<Vec<ToolRow>, sqlx::Error> {
        sqlx::query_as::<_, ToolRow>(
            "SELECT t.* FROM tools t
             JOIN agent_tools at ON at.tool_id = t.id
             WHERE at.agent_id = ?
             ORDER BY t.name",
        )
        .bind(agent_id)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::ToolRepository;
    use crate::db::schema;

    async fn setup_db() -> DatabasePool {
        let pool = crate::db::connect("sqlite::memory:").await.unwrap();
        schema::create_all(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let pool = setup_db().await;
        let agent = AgentRepository::create(
            &pool,
            "researcher",
            Some("Finds things"),
            "You research topics.",
            r#"{"provider":"openai","model":"gpt-4o"}"#,
            None,
        )
        .await
        .unwrap();

        let fetched = AgentRepository::get_by_id(&pool, &agent.id).await.unwrap();
        assert_eq!(fetched.unwrap().name, "researcher");
    }

    #[tokio::test]
    async fn test_tool_binding_cascade() {
        let pool = setup_db().await;
        let agent = AgentRepository::create(
            &pool,
            "a",
            None,
            "i",
            r#"{"provider":"openai","model":"gpt-4o"}"#,
            None,
        )
        .await
        .unwrap();
        let tool = ToolRepository::create(
            &pool,
            "calculator",
            None,
            r#"{"type":"object"}"#,
            "builtin:calculator",
            None,
        )
        .await
        .unwrap();

        AgentRepository::bind_tool(&pool, &agent.id, &tool.id)
            .await
            .unwrap();
        // Binding twice is a no-op.
        AgentRepository::bind_tool(&pool, &agent.id, &tool.id)
            .await
            .unwrap();
        assert_eq!(
            AgentRepository::tools_for(&pool, &agent.id).await.unwrap().len(),
            1
        );

        // Deleting the tool cascades the binding.
        ToolRepository::delete(&pool, &tool.id).await.unwrap();
        assert!(AgentRepository::tools_for(&pool, &agent.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_agent() {
        let pool = setup_db().await;
        assert!(!AgentRepository::delete(&pool, "nope").await.unwrap());
    }
}
