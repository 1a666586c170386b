//! Core-engine bindings
//!
//! Adapters that plug the entity store into `agentgraph-core`: the SQLite
//! checkpointer, the transactional run journal, and the resolver that turns
//! stored agent and workflow rows into compiled plan inputs.

pub mod checkpointer;
pub mod journal;
pub mod resolver;

pub use checkpointer::SqliteCheckpointer;
pub use journal::SqliteRunJournal;
pub use resolver::DbAgentResolver;
