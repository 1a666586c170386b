//! agentgraph server binary
//!
//! Wires settings, logging, the entity and checkpoint stores, the tool
//! registry, the provider factory, and the HTTP router, then serves.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use agentgraph_checkpoint::Checkpointer;
use llm::ProviderFactory;
use orchestrator::api::{create_router, AppState};
use orchestrator::db;
use orchestrator::engine::SqliteCheckpointer;
use orchestrator::services::{ExecutionService, WorkflowService};
use orchestrator::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;

    let default_filter = if settings.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let pool = db::connect(&settings.database_url)
        .await
        .context("connecting entity store")?;
    db::schema::create_entity_tables(&pool)
        .await
        .context("creating entity tables")?;

    let shared = settings.shared_checkpoint_store();
    let checkpoint_pool = if shared {
        pool.clone()
    } else {
        db::connect(&settings.checkpoint_db_url)
            .await
            .context("connecting checkpoint store")?
    };
    SqliteCheckpointer::new(checkpoint_pool.clone())
        .setup()
        .await
        .context("creating checkpoint tables")?;

    // Custom tools are registered here, before the registry is shared;
    // after this point it is read-only.
    let tools = Arc::new(tooling::builtin_registry());
    let providers = Arc::new(ProviderFactory::from_env()?);

    let executions = ExecutionService::new(
        pool.clone(),
        checkpoint_pool,
        shared,
        providers,
        tools,
    );
    let workflows = WorkflowService::new(pool.clone());

    let state = AppState {
        db: pool,
        settings: Arc::new(settings.clone()),
        executions,
        workflows,
    };
    let router = create_router(state);

    let address = settings.bind_address();
    info!(%address, "agentgraph server listening");
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {}", address))?;
    axum::serve(listener, router).await?;

    Ok(())
}
