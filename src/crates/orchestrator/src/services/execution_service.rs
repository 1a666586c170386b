//! Execution service
//!
//! Owns the execution lifecycle: opens the durable record, compiles the
//! stored workflow, drives the plan through the core executor with a
//! per-execution cancel flag, and finalizes the record on completion,
//! failure, or cancellation. The streaming path runs the same pipeline on a
//! background task and hands the event channel to the SSE endpoint.

use dashmap::DashMap;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use agentgraph_checkpoint::Checkpointer;
use agentgraph_core::event::{self, EventReceiver, EventSender};
use agentgraph_core::plan::Compiler;
use agentgraph_core::tool::ToolRegistry;
use agentgraph_core::{AgentResolver, ExecutionStatus, Executor};
use llm::ProviderFactory;

use crate::db::models::{ExecutionRow, ExecutionStepRow};
use crate::db::repositories::ExecutionRepository;
use crate::db::repositories::WorkflowRepository;
use crate::db::DatabasePool;
use crate::engine::{DbAgentResolver, SqliteCheckpointer, SqliteRunJournal};
use crate::services::{ServiceError, ServiceResult};

/// Request body for starting an execution.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionCreate {
    pub workflow_id: Uuid,
    #[serde(default)]
    pub input: Value,
    /// Stable across resume; generated when omitted.
    #[serde(default)]
    pub thread_id: Option<String>,
    /// Extra execution configuration, stored under `state.metadata`.
    #[serde(default)]
    pub config: Option<Value>,
}

/// Service driving workflow executions.
#[derive(Clone)]
pub struct ExecutionService {
    pool: DatabasePool,
    checkpoint_pool: DatabasePool,
    shared_store: bool,
    providers: Arc<ProviderFactory>,
    tools: Arc<ToolRegistry>,
    /// Cancel flags of in-process executions, by execution id.
    running: Arc<DashMap<String, Arc<AtomicBool>>>,
}

impl ExecutionService {
    pub fn new(
        pool: DatabasePool,
        checkpoint_pool: DatabasePool,
        shared_store: bool,
        providers: Arc<ProviderFactory>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            pool,
            checkpoint_pool,
            shared_store,
            providers,
            tools,
            running: Arc::new(DashMap::new()),
        }
    }

    /// Execute a workflow and wait for the terminal state.
    pub async fn execute(
        &self,
        request: ExecutionCreate,
    ) -> ServiceResult<(ExecutionRow, Vec<ExecutionStepRow>)> {
        let execution = self.open_execution(&request).await?;
        let config = request.config.clone().unwrap_or_else(|| json!({}));
        self.drive(&execution, config, None, false).await?;
        self.get(&execution.id).await
    }

    /// Execute a workflow on a background task, returning the opened record
    /// and the event channel for the SSE endpoint.
    pub async fn execute_stream(
        &self,
        request: ExecutionCreate,
    ) -> ServiceResult<(ExecutionRow, EventReceiver)> {
        let execution = self.open_execution(&request).await?;
        let config = request.config.clone().unwrap_or_else(|| json!({}));
        let (events, receiver) = event::channel();

        let service = self.clone();
        let record = execution.clone();
        tokio::spawn(async move {
            if let Err(e) = service.drive(&record, config, Some(events), false).await {
                // The record already carries the failure; the stream got the
                // error event.
                error!(execution = %record.id, "streamed execution failed: {}", e);
            }
        });

        Ok((execution, receiver))
    }

    async fn open_execution(&self, request: &ExecutionCreate) -> ServiceResult<ExecutionRow> {
        let workflow_id = request.workflow_id.to_string();
        WorkflowRepository::get_by_id(&self.pool, &workflow_id)
            .await?
            .ok_or(ServiceError::NotFound {
                kind: "Workflow",
                id: workflow_id.clone(),
            })?;

        let thread_id = request
            .thread_id
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(generate_thread_id);
        let input_data = serde_json::to_string(&request.input)?;

        let execution =
            ExecutionRepository::create(&self.pool, &workflow_id, &thread_id, Some(&input_data))
                .await?;
        info!(execution = %execution.id, workflow = %workflow_id, thread = %thread_id,
              "execution created");
        Ok(execution)
    }

    /// Run one execution to a terminal state, maintaining the FSM and the
    /// live-flag registry.
    async fn drive(
        &self,
        execution: &ExecutionRow,
        config: Value,
        events: Option<EventSender>,
        resume: bool,
    ) -> ServiceResult<()> {
        let cancel = Arc::new(AtomicBool::new(false));
        self.running.insert(execution.id.clone(), cancel.clone());
        let result = self.drive_inner(execution, config, events, resume, cancel).await;
        self.running.remove(&execution.id);
        result
    }

    async fn drive_inner(
        &self,
        execution: &ExecutionRow,
        config: Value,
        events: Option<EventSender>,
        resume: bool,
        cancel: Arc<AtomicBool>,
    ) -> ServiceResult<()> {
        ExecutionRepository::mark_running(&self.pool, &execution.id).await?;

        let resolver = DbAgentResolver::new(
            self.pool.clone(),
            self.providers.clone(),
            self.tools.clone(),
        );

        let execution_id: Uuid = execution
            .id
            .parse()
            .map_err(|_| ServiceError::Internal(format!("bad execution id {}", execution.id)))?;
        let workflow_id: Uuid = execution
            .workflow_id
            .parse()
            .map_err(|_| ServiceError::Internal(format!("bad workflow id {}", execution.workflow_id)))?;

        let compiled = async {
            let def = resolver.load_workflow(workflow_id).await?;
            Compiler::new(&resolver).compile(&def).await
        }
        .await;

        let plan = match compiled {
            Ok(plan) => plan,
            Err(e) => {
                let message = e.to_string();
                ExecutionRepository::mark_failed(&self.pool, &execution.id, &message).await?;
                return Err(e.into());
            }
        };

        let journal = Arc::new(SqliteRunJournal::new(
            self.pool.clone(),
            self.checkpoint_pool.clone(),
            self.shared_store,
        ));
        let mut executor = Executor::new(journal);
        if let Some(events) = events {
            executor = executor.with_events(events);
        }

        let input: Value = execution
            .input_data
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?
            .unwrap_or_else(|| json!({}));

        let run_result = if resume {
            let checkpointer = SqliteCheckpointer::new(self.checkpoint_pool.clone());
            let snapshot = checkpointer
                .load_latest(&execution.thread_id)
                .await
                .map_err(|e| ServiceError::Internal(e.to_string()))?;
            let last_completed =
                ExecutionRepository::last_completed_node(&self.pool, &execution.id).await?;

            match snapshot {
                Some(snapshot) => {
                    executor
                        .resume(
                            &plan,
                            execution_id,
                            &execution.thread_id,
                            snapshot.state,
                            last_completed.as_deref(),
                            snapshot.step_index + 1,
                            cancel,
                        )
                        .await
                }
                // Nothing checkpointed yet: start over on the same thread.
                None => {
                    executor
                        .run(&plan, execution_id, &execution.thread_id, input, config, cancel)
                        .await
                }
            }
        } else {
            executor
                .run(&plan, execution_id, &execution.thread_id, input, config, cancel)
                .await
        };

        match run_result {
            Ok(final_state) => {
                let output_data = json!({
                    "output": final_state.get("output").cloned().unwrap_or(Value::Null),
                    "intermediate": final_state.get("intermediate").cloned().unwrap_or(json!({})),
                });
                ExecutionRepository::mark_completed(
                    &self.pool,
                    &execution.id,
                    &serde_json::to_string(&output_data)?,
                )
                .await?;
                Ok(())
            }
            Err(e) if e.is_cancellation() => {
                ExecutionRepository::mark_cancelled(&self.pool, &execution.id).await?;
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                ExecutionRepository::mark_failed(&self.pool, &execution.id, &message).await?;
                Err(ServiceError::Execution {
                    execution_id: execution.id.clone(),
                    message,
                })
            }
        }
    }

    pub async fn get(
        &self,
        execution_id: &str,
    ) -> ServiceResult<(ExecutionRow, Vec<ExecutionStepRow>)> {
        let execution = ExecutionRepository::get_by_id(&self.pool, execution_id)
            .await?
            .ok_or(ServiceError::NotFound {
                kind: "Execution",
                id: execution_id.to_string(),
            })?;
        let steps = ExecutionRepository::steps_for(&self.pool, execution_id).await?;
        Ok((execution, steps))
    }

    pub async fn list(
        &self,
        workflow_id: Option<Uuid>,
        status: Option<ExecutionStatus>,
        limit: i64,
        offset: i64,
    ) -> ServiceResult<(Vec<ExecutionRow>, i64)> {
        let workflow_id = workflow_id.map(|id| id.to_string());
        Ok(ExecutionRepository::list(
            &self.pool,
            workflow_id.as_deref(),
            status,
            limit,
            offset,
        )
        .await?)
    }

    /// Request cancellation. Cancelling a terminal execution is a no-op
    /// returning the current record; a pending execution cancels
    /// immediately; a running one flips the cooperative flag and transitions
    /// once the scheduler observes it.
    pub async fn cancel(
        &self,
        execution_id: &str,
    ) -> ServiceResult<(ExecutionRow, Vec<ExecutionStepRow>)> {
        let (execution, _) = self.get(execution_id).await?;

        match execution.status()? {
            status if status.is_terminal() => {}
            ExecutionStatus::Pending => {
                ExecutionRepository::mark_cancelled(&self.pool, execution_id).await?;
            }
            _ => match self.running.get(execution_id) {
                Some(flag) => flag.store(true, Ordering::SeqCst),
                // Running in a process that is gone; close the record.
                None => ExecutionRepository::mark_cancelled(&self.pool, execution_id).await?,
            },
        }

        self.get(execution_id).await
    }

    pub async fn delete(&self, execution_id: &str) -> ServiceResult<()> {
        let (execution, _) = self.get(execution_id).await?;
        if execution.status()? == ExecutionStatus::Running {
            return Err(ServiceError::Conflict(
                "cannot delete a running execution".to_string(),
            ));
        }

        ExecutionRepository::delete(&self.pool, execution_id).await?;
        let checkpointer = SqliteCheckpointer::new(self.checkpoint_pool.clone());
        checkpointer
            .delete_thread(&execution.thread_id)
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        Ok(())
    }

    /// Resume a failed or cancelled execution on its original thread.
    /// Resuming a completed execution is a no-op returning the existing
    /// record; pending and running executions conflict.
    pub async fn resume(
        &self,
        execution_id: &str,
    ) -> ServiceResult<(ExecutionRow, Vec<ExecutionStepRow>)> {
        let (execution, steps) = self.get(execution_id).await?;

        match execution.status()? {
            ExecutionStatus::Completed => return Ok((execution, steps)),
            ExecutionStatus::Failed | ExecutionStatus::Cancelled => {}
            other => {
                return Err(ServiceError::Conflict(format!(
                    "cannot resume an execution in status '{}'",
                    other.as_str()
                )))
            }
        }

        self.drive(&execution, json!({}), None, true).await?;
        self.get(execution_id).await
    }

    /// Start a fresh execution with the original input and a new thread.
    pub async fn restart(
        &self,
        execution_id: &str,
    ) -> ServiceResult<(ExecutionRow, Vec<ExecutionStepRow>)> {
        let (execution, _) = self.get(execution_id).await?;
        if !execution.status()?.is_terminal() {
            return Err(ServiceError::Conflict(
                "cannot restart a non-terminal execution".to_string(),
            ));
        }

        let fresh = ExecutionRepository::create(
            &self.pool,
            &execution.workflow_id,
            &generate_thread_id(),
            execution.input_data.as_deref(),
        )
        .await?;

        self.drive(&fresh, json!({}), None, false).await?;
        self.get(&fresh.id).await
    }

    /// Progress summary reconstructed from the step table.
    pub async fn status(&self, execution_id: &str) -> ServiceResult<(ExecutionRow, Value)> {
        let (execution, steps) = self.get(execution_id).await?;

        let total = steps.len();
        let completed = steps.iter().filter(|s| s.status == "completed").count();
        let current = steps
            .iter()
            .find(|s| s.status == "running")
            .map(|s| s.node_id.clone());
        let percentage = if total == 0 {
            0
        } else {
            (completed * 100 / total) as i64
        };

        let progress = json!({
            "total_steps": total,
            "completed_steps": completed,
            "current_node": current,
            "percentage": percentage,
        });
        Ok((execution, progress))
    }
}

fn generate_thread_id() -> String {
    format!("exec_{}", &Uuid::new_v4().simple().to_string()[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_thread_id_shape() {
        let thread_id = generate_thread_id();
        assert!(thread_id.starts_with("exec_"));
        assert_eq!(thread_id.len(), "exec_".len() + 12);
    }

    #[test]
    fn test_execution_create_defaults() {
        let request: ExecutionCreate = serde_json::from_value(json!({
            "workflow_id": Uuid::new_v4(),
        }))
        .unwrap();
        assert!(request.input.is_null());
        assert!(request.thread_id.is_none());
        assert!(request.config.is_none());
    }
}
