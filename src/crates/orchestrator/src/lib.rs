//! agentgraph orchestrator
//!
//! The deployable service around `agentgraph-core`: an axum HTTP API with
//! `X-API-Key` authentication, a SQLite entity store for agents, tools, and
//! workflow definitions, a durable execution journal with transactional
//! checkpoints, and the execution service that compiles stored workflows and
//! drives them through the core executor, streaming progress as
//! Server-Sent Events.

pub mod api;
pub mod config;
pub mod db;
pub mod engine;
pub mod services;

pub use config::Settings;
