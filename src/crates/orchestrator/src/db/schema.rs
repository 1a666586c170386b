//! Schema bootstrap
//!
//! Creates every table on startup. `CREATE TABLE IF NOT EXISTS` keeps the
//! bootstrap idempotent; the checkpoints table may live in a separate
//! database and gets its own setup entry point.

use crate::db::DatabasePool;

const ENTITY_TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS agents (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        description TEXT,
        instructions TEXT NOT NULL,
        llm_config TEXT NOT NULL,
        output_schema TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS tools (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL UNIQUE,
        description TEXT,
        function_schema TEXT NOT NULL,
        implementation_ref TEXT NOT NULL,
        config TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS agent_tools (
        agent_id TEXT NOT NULL REFERENCES agents(id) ON DELETE CASCADE,
        tool_id TEXT NOT NULL REFERENCES tools(id) ON DELETE CASCADE,
        PRIMARY KEY (agent_id, tool_id)
    )",
    "CREATE TABLE IF NOT EXISTS workflows (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        description TEXT,
        state_schema TEXT,
        is_template INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS workflow_nodes (
        id TEXT PRIMARY KEY NOT NULL,
        workflow_id TEXT NOT NULL REFERENCES workflows(id) ON DELETE CASCADE,
        node_id TEXT NOT NULL,
        node_type TEXT NOT NULL
            CHECK (node_type IN ('agent', 'router', 'parallel', 'join', 'subgraph')),
        agent_id TEXT REFERENCES agents(id) ON DELETE SET NULL,
        router_config TEXT,
        parallel_nodes TEXT,
        subgraph_workflow_id TEXT REFERENCES workflows(id) ON DELETE SET NULL,
        config TEXT,
        UNIQUE (workflow_id, node_id)
    )",
    "CREATE TABLE IF NOT EXISTS workflow_edges (
        id TEXT PRIMARY KEY NOT NULL,
        workflow_id TEXT NOT NULL REFERENCES workflows(id) ON DELETE CASCADE,
        source_node TEXT NOT NULL,
        target_node TEXT NOT NULL,
        condition TEXT
    )",
    "CREATE TABLE IF NOT EXISTS executions (
        id TEXT PRIMARY KEY NOT NULL,
        workflow_id TEXT NOT NULL REFERENCES workflows(id) ON DELETE CASCADE,
        thread_id TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending'
            CHECK (status IN ('pending', 'running', 'completed', 'failed', 'cancelled')),
        input_data TEXT,
        output_data TEXT,
        error_message TEXT,
        created_at TEXT NOT NULL,
        started_at TEXT,
        completed_at TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_executions_workflow ON executions(workflow_id)",
    "CREATE INDEX IF NOT EXISTS idx_executions_thread ON executions(thread_id)",
    "CREATE INDEX IF NOT EXISTS idx_executions_status ON executions(status)",
    "CREATE TABLE IF NOT EXISTS execution_steps (
        id TEXT PRIMARY KEY NOT NULL,
        execution_id TEXT NOT NULL REFERENCES executions(id) ON DELETE CASCADE,
        node_id TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        input_data TEXT,
        output_data TEXT,
        error_message TEXT,
        started_at TEXT,
        completed_at TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_steps_execution ON execution_steps(execution_id)",
];

const CHECKPOINT_TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS checkpoints (
        thread_id TEXT NOT NULL,
        step_index INTEGER NOT NULL,
        state TEXT NOT NULL,
        created_at TEXT NOT NULL,
        PRIMARY KEY (thread_id, step_index)
    )",
];

/// Create the entity-store tables.
pub async fn create_entity_tables(pool: &DatabasePool) -> Result<(), sqlx::Error> {
    for statement in ENTITY_TABLES {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

/// Create the checkpoint table.
pub async fn create_checkpoint_tables(pool: &DatabasePool) -> Result<(), sqlx::Error> {
    for statement in CHECKPOINT_TABLES {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

/// Set up every table in a shared database. Test helper and single-store
/// deployments.
pub async fn create_all(pool: &DatabasePool) -> Result<(), sqlx::Error> {
    create_entity_tables(pool).await?;
    create_checkpoint_tables(pool).await
}
