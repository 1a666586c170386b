//! Database layer
//!
//! SQLite via sqlx. Timestamps are stored as RFC3339 TEXT and JSON columns
//! as TEXT, decoded at the edges. Primary keys are UUID strings.

pub mod connection;
pub mod error;
pub mod models;
pub mod repositories;
pub mod schema;

pub use connection::{connect, DatabasePool};
pub use error::DatabaseError;
