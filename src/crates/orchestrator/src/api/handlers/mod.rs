//! Request handlers

pub mod agents;
pub mod executions;
pub mod health;
pub mod tools;
pub mod workflows;
