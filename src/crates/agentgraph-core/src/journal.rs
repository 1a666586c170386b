//! Step audit trail and atomic snapshot persistence
//!
//! The executor reports every node invocation through a [`RunJournal`]:
//! a step opens when the node is dispatched and closes when it completes,
//! fails, or is cancelled. Closing a successful step also persists the
//! post-fold state snapshot - the journal implementation must write the step
//! row and the checkpoint in a single transaction so the audit trail and the
//! resumable state can never diverge.
//!
//! [`MemoryJournal`] is the in-process implementation used by tests and
//! embedded runs; the orchestrator provides a SQLite-backed one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::error::Result;
use agentgraph_checkpoint::Checkpointer;

/// Lifecycle status shared by executions and their steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ExecutionStatus::Pending),
            "running" => Ok(ExecutionStatus::Running),
            "completed" => Ok(ExecutionStatus::Completed),
            "failed" => Ok(ExecutionStatus::Failed),
            "cancelled" => Ok(ExecutionStatus::Cancelled),
            other => Err(format!("unknown execution status '{}'", other)),
        }
    }
}

/// Durable record sink for execution steps.
#[async_trait]
pub trait RunJournal: Send + Sync {
    /// Open a step for a dispatched node. Returns the step id.
    async fn step_started(
        &self,
        execution_id: Uuid,
        node_id: &str,
        input: &Value,
    ) -> Result<Uuid>;

    /// Close a step as completed and persist the post-fold snapshot for
    /// `(thread_id, step_index)` in the same transaction. `soft_error`
    /// carries recovered errors (failed condition evaluation, structured
    /// output mismatch) that do not fail the step.
    #[allow(clippy::too_many_arguments)]
    async fn step_completed(
        &self,
        step_id: Uuid,
        output: &Value,
        soft_error: Option<&str>,
        thread_id: &str,
        step_index: u64,
        snapshot: &Value,
    ) -> Result<()>;

    /// Close a step as failed.
    async fn step_failed(&self, step_id: Uuid, error: &str) -> Result<()>;

    /// Mark an in-progress step cancelled.
    async fn step_cancelled(&self, step_id: Uuid) -> Result<()>;
}

/// One recorded step, as kept by [`MemoryJournal`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub node_id: String,
    pub status: ExecutionStatus,
    pub input_data: Option<Value>,
    pub output_data: Option<Value>,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// In-memory journal backed by any [`Checkpointer`].
pub struct MemoryJournal {
    steps: Mutex<Vec<StepRecord>>,
    checkpointer: Arc<dyn Checkpointer>,
}

impl MemoryJournal {
    pub fn new(checkpointer: Arc<dyn Checkpointer>) -> Self {
        Self {
            steps: Mutex::new(Vec::new()),
            checkpointer,
        }
    }

    /// All recorded steps in dispatch order.
    pub fn steps(&self) -> Vec<StepRecord> {
        self.steps.lock().expect("journal mutex poisoned").clone()
    }

    /// Steps for one execution in dispatch order.
    pub fn steps_for(&self, execution_id: Uuid) -> Vec<StepRecord> {
        self.steps()
            .into_iter()
            .filter(|s| s.execution_id == execution_id)
            .collect()
    }

    fn close_step(
        &self,
        step_id: Uuid,
        status: ExecutionStatus,
        output: Option<Value>,
        error: Option<String>,
    ) {
        let mut steps = self.steps.lock().expect("journal mutex poisoned");
        if let Some(step) = steps.iter_mut().find(|s| s.id == step_id) {
            step.status = status;
            step.output_data = output;
            if error.is_some() {
                step.error_message = error;
            }
            step.completed_at = Some(Utc::now());
        }
    }
}

#[async_trait]
impl RunJournal for MemoryJournal {
    async fn step_started(
        &self,
        execution_id: Uuid,
        node_id: &str,
        input: &Value,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let record = StepRecord {
            id,
            execution_id,
            node_id: node_id.to_string(),
            status: ExecutionStatus::Running,
            input_data: if input.is_null() {
                None
            } else {
                Some(input.clone())
            },
            output_data: None,
            error_message: None,
            started_at: Utc::now(),
            completed_at: None,
        };
        self.steps.lock().expect("journal mutex poisoned").push(record);
        Ok(id)
    }

    async fn step_completed(
        &self,
        step_id: Uuid,
        output: &Value,
        soft_error: Option<&str>,
        thread_id: &str,
        step_index: u64,
        snapshot: &Value,
    ) -> Result<()> {
        self.close_step(
            step_id,
            ExecutionStatus::Completed,
            Some(output.clone()),
            soft_error.map(str::to_string),
        );
        self.checkpointer.save(thread_id, step_index, snapshot).await?;
        Ok(())
    }

    async fn step_failed(&self, step_id: Uuid, error: &str) -> Result<()> {
        self.close_step(
            step_id,
            ExecutionStatus::Failed,
            None,
            Some(error.to_string()),
        );
        Ok(())
    }

    async fn step_cancelled(&self, step_id: Uuid) -> Result<()> {
        self.close_step(step_id, ExecutionStatus::Cancelled, None, None);
        Ok(())
    }
}
