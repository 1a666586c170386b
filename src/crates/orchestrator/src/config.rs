//! Environment configuration
//!
//! Everything is configured through environment variables, mirroring the
//! deployment model of the service: `API_KEY` (required), `DATABASE_URL`,
//! `CHECKPOINT_DB_URL` (falls back to `DATABASE_URL`), `HOST`, `PORT`, and
//! `DEBUG`. Provider credentials (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`,
//! `GOOGLE_API_KEY`) are read by the provider factory, not here.

use anyhow::{bail, Context, Result};

const DEFAULT_DATABASE_URL: &str = "sqlite:agentgraph.db?mode=rwc";

/// Application settings loaded from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Shared secret compared against the `X-API-Key` header.
    pub api_key: String,

    /// Entity store DSN.
    pub database_url: String,

    /// Checkpoint store DSN; defaults to the entity store.
    pub checkpoint_db_url: String,

    /// Bind address.
    pub host: String,
    pub port: u16,

    /// Verbose logging.
    pub debug: bool,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let api_key = match std::env::var("API_KEY") {
            Ok(key) if !key.trim().is_empty() => key,
            _ => bail!("API_KEY must be set"),
        };

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
        let checkpoint_db_url =
            std::env::var("CHECKPOINT_DB_URL").unwrap_or_else(|_| database_url.clone());

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse::<u16>()
            .context("PORT must be a number")?;
        let debug = std::env::var("DEBUG")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            api_key,
            database_url,
            checkpoint_db_url,
            host,
            port,
            debug,
        })
    }

    /// Whether entity and checkpoint stores share one database. When they
    /// do, step rows and snapshots commit in a single transaction.
    pub fn shared_checkpoint_store(&self) -> bool {
        self.checkpoint_db_url == self.database_url
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
