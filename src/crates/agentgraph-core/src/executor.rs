//! Plan scheduler and executor
//!
//! Drives a compiled [`Plan`]: pops work items off the frontier, invokes
//! operators, folds their partial updates into the shared state through the
//! reducer table, routes along edge groups, and persists a step record plus
//! a state snapshot after every fold. Parallel sections run their siblings
//! concurrently with respect to I/O while folds stay serialized on the
//! scheduler task; a barrier counts outstanding siblings and enqueues the
//! join once every sibling's update has been folded.
//!
//! Cancellation is cooperative: the flag is observed before every work item,
//! between agent tool iterations, and between sibling completions. In-flight
//! provider calls finish on their own; the next checkpoint observes the flag
//! and stops.

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{GraphError, Result};
use crate::event::{EventSender, ExecutionEvent};
use crate::graph::{JoinStrategy, NodeId, END, START};
use crate::journal::RunJournal;
use crate::plan::{JoinOperator, Operator, ParallelOperator, Plan};
use crate::send::Send as NodeSend;
use crate::state::{value_to_text, StateSchema};

/// Executes compiled plans against a journal, optionally emitting events.
pub struct Executor {
    journal: Arc<dyn RunJournal>,
    events: Option<EventSender>,
}

impl Executor {
    pub fn new(journal: Arc<dyn RunJournal>) -> Self {
        Self {
            journal,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Run a plan from the start. Returns the final state; the execution
    /// output is its `output` key.
    pub async fn run(
        &self,
        plan: &Plan,
        execution_id: Uuid,
        thread_id: &str,
        input: Value,
        config: Value,
        cancel: Arc<AtomicBool>,
    ) -> Result<Value> {
        let state = StateSchema::initial_state(input, config);
        let (first, route_error) = plan.next_from(START, &state);
        if let Some(error) = route_error {
            warn!(workflow = %plan.workflow_id, "start edge condition error: {}", error);
        }
        self.run_outer(plan, execution_id, thread_id, state, first, 0, cancel)
            .await
    }

    /// Resume from a restored snapshot. The frontier is rebuilt as the edges
    /// leaving the last successfully-completed node; completed nodes are not
    /// re-executed.
    pub async fn resume(
        &self,
        plan: &Plan,
        execution_id: Uuid,
        thread_id: &str,
        state: Value,
        last_completed: Option<&str>,
        next_step_index: u64,
        cancel: Arc<AtomicBool>,
    ) -> Result<Value> {
        let (first, _) = match last_completed {
            Some(node) => plan.next_from(node, &state),
            None => plan.next_from(START, &state),
        };
        self.run_outer(
            plan,
            execution_id,
            thread_id,
            state,
            first,
            next_step_index,
            cancel,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_outer(
        &self,
        plan: &Plan,
        execution_id: Uuid,
        thread_id: &str,
        state: Value,
        first: NodeId,
        step_index: u64,
        cancel: Arc<AtomicBool>,
    ) -> Result<Value> {
        self.emit(ExecutionEvent::ExecutionStarted {
            execution_id,
            thread_id: thread_id.to_string(),
        });

        let result = self
            .run_loop(plan, execution_id, thread_id, state, first, step_index, &cancel)
            .await;

        match &result {
            Ok(state) => self.emit(ExecutionEvent::ExecutionComplete {
                execution_id,
                output: state.get("output").cloned().unwrap_or(Value::Null),
            }),
            Err(e) if e.is_cancellation() => {
                // A cancelled execution ends the stream without a terminal
                // event.
                debug!(%execution_id, "execution cancelled");
            }
            Err(e) => self.emit(ExecutionEvent::Error {
                execution_id,
                error: e.to_string(),
            }),
        }

        result
    }

    /// The scheduler loop. Boxed so sub-graph operators can re-enter it.
    fn run_loop<'a>(
        &'a self,
        plan: &'a Plan,
        execution_id: Uuid,
        thread_id: &'a str,
        mut state: Value,
        first: NodeId,
        start_index: u64,
        cancel: &'a Arc<AtomicBool>,
    ) -> BoxFuture<'a, Result<Value>> {
        Box::pin(async move {
            let mut frontier: VecDeque<NodeId> = VecDeque::new();
            if first != END {
                frontier.push_back(first);
            }
            let mut step_index = start_index;

            while let Some(node_id) = frontier.pop_front() {
                if cancel.load(Ordering::SeqCst) {
                    return Err(GraphError::Cancelled);
                }

                let operator = plan.operators.get(&node_id).ok_or_else(|| {
                    GraphError::Execution(format!("plan has no operator for node '{}'", node_id))
                })?;

                if let Operator::Parallel(parallel) = operator {
                    step_index = self
                        .run_parallel(
                            plan,
                            execution_id,
                            thread_id,
                            &mut state,
                            &node_id,
                            parallel,
                            step_index,
                            cancel,
                        )
                        .await?;
                    if let Some(join) = &parallel.barrier {
                        frontier.push_back(join.clone());
                    }
                    continue;
                }

                let step_id = self
                    .journal
                    .step_started(execution_id, &node_id, &Value::Null)
                    .await?;
                self.emit(ExecutionEvent::NodeStart {
                    node_id: node_id.clone(),
                });

                let invoked = self
                    .invoke_operator(plan, execution_id, operator, &node_id, state.clone(), cancel)
                    .await;
                let (partial, node_error) = match invoked {
                    Ok(output) => output,
                    Err(e) => return self.fail_step(step_id, &node_id, e).await,
                };

                plan.schema.apply(&mut state, &partial)?;

                let (next, route_error) = plan.next_from(&node_id, &state);
                let soft_error = join_errors(node_error, route_error);

                step_index += 1;
                self.journal
                    .step_completed(
                        step_id,
                        &partial,
                        soft_error.as_deref(),
                        thread_id,
                        step_index,
                        &state,
                    )
                    .await?;
                self.emit(ExecutionEvent::NodeComplete {
                    node_id: node_id.clone(),
                    output: partial,
                });

                if next == END {
                    return Ok(state);
                }
                frontier.push_back(next);
            }

            // Frontier drained without reaching __end__: the last node had no
            // outgoing edges. Treated as completion with the current state.
            Ok(state)
        })
    }

    /// Dispatch a parallel section and fold sibling updates as they land.
    /// Returns the step index after the section.
    #[allow(clippy::too_many_arguments)]
    async fn run_parallel(
        &self,
        plan: &Plan,
        execution_id: Uuid,
        thread_id: &str,
        state: &mut Value,
        node_id: &str,
        parallel: &ParallelOperator,
        mut step_index: u64,
        cancel: &Arc<AtomicBool>,
    ) -> Result<u64> {
        let step_id = self
            .journal
            .step_started(execution_id, node_id, &Value::Null)
            .await?;
        self.emit(ExecutionEvent::NodeStart {
            node_id: node_id.to_string(),
        });

        let sends = build_sends(parallel, state);
        let dispatched: Vec<NodeId> = sends.iter().map(|s| s.target.clone()).collect();
        let dispatch_update = json!({"current_node": node_id, "sends": dispatched});

        step_index += 1;
        self.journal
            .step_completed(step_id, &dispatch_update, None, thread_id, step_index, state)
            .await?;
        self.emit(ExecutionEvent::NodeComplete {
            node_id: node_id.to_string(),
            output: dispatch_update,
        });

        if sends.is_empty() {
            return Ok(step_index);
        }

        let mut in_flight = FuturesUnordered::new();
        let mut open_steps: Vec<Uuid> = Vec::new();

        for send in sends {
            let operator = plan.operators.get(&send.target).ok_or_else(|| {
                GraphError::Execution(format!(
                    "plan has no operator for parallel sibling '{}'",
                    send.target
                ))
            })?;
            let sibling_step = self
                .journal
                .step_started(execution_id, &send.target, &sibling_input(&send.payload))
                .await?;
            self.emit(ExecutionEvent::NodeStart {
                node_id: send.target.clone(),
            });
            open_steps.push(sibling_step);

            let target = send.target;
            let payload = send.payload;
            in_flight.push(async move {
                let result = self
                    .invoke_operator(plan, execution_id, operator, &target, payload, cancel)
                    .await;
                (sibling_step, target, result)
            });
        }

        // Sibling writes to a non-commutative key conflict when two branches
        // of the same barrier claim it.
        let mut scalar_claims: HashMap<String, String> = HashMap::new();

        while let Some((sibling_step, target, result)) = in_flight.next().await {
            open_steps.retain(|id| *id != sibling_step);

            if cancel.load(Ordering::SeqCst) {
                self.journal.step_cancelled(sibling_step).await?;
                self.cancel_steps(&open_steps).await;
                return Err(GraphError::Cancelled);
            }

            let (partial, soft_error) = match result {
                Ok(output) => output,
                Err(e) if e.is_cancellation() => {
                    self.journal.step_cancelled(sibling_step).await?;
                    self.cancel_steps(&open_steps).await;
                    return Err(GraphError::Cancelled);
                }
                Err(e) => {
                    let message = e.to_string();
                    self.journal.step_failed(sibling_step, &message).await?;
                    self.cancel_steps(&open_steps).await;
                    return Err(GraphError::NodeExecution {
                        node: target,
                        error: message,
                    });
                }
            };

            if let Err(conflict) =
                fold_sibling(&plan.schema, state, &partial, &mut scalar_claims, &target)
            {
                let message = conflict.to_string();
                self.journal.step_failed(sibling_step, &message).await?;
                self.cancel_steps(&open_steps).await;
                return Err(conflict);
            }

            step_index += 1;
            self.journal
                .step_completed(
                    sibling_step,
                    &partial,
                    soft_error.as_deref(),
                    thread_id,
                    step_index,
                    state,
                )
                .await?;
            self.emit(ExecutionEvent::NodeComplete {
                node_id: target,
                output: partial,
            });
        }

        Ok(step_index)
    }

    /// Invoke one operator against a state snapshot, under the node's
    /// wall-clock budget when one is configured.
    async fn invoke_operator(
        &self,
        plan: &Plan,
        execution_id: Uuid,
        operator: &Operator,
        node_id: &str,
        state: Value,
        cancel: &Arc<AtomicBool>,
    ) -> Result<(Value, Option<String>)> {
        let invocation = self.invoke_inner(plan, execution_id, operator, node_id, state, cancel);
        match plan.timeout_for(node_id) {
            Some(seconds) => {
                match tokio::time::timeout(Duration::from_secs(seconds), invocation).await {
                    Ok(result) => result,
                    Err(_) => Err(GraphError::Timeout {
                        node: node_id.to_string(),
                        seconds,
                    }),
                }
            }
            None => invocation.await,
        }
    }

    async fn invoke_inner(
        &self,
        plan: &Plan,
        execution_id: Uuid,
        operator: &Operator,
        node_id: &str,
        state: Value,
        cancel: &Arc<AtomicBool>,
    ) -> Result<(Value, Option<String>)> {
        match operator {
            Operator::Agent(agent) => agent.run(&state, cancel).await,
            Operator::Router => Ok((json!({ "current_node": node_id }), None)),
            Operator::Join(join) => {
                let aggregated = join.aggregate(&state);
                let mut update = Map::new();
                update.insert("current_node".to_string(), json!(node_id));
                update.insert(join.output_key.clone(), aggregated.clone());
                update.insert("output".to_string(), aggregated);
                Ok((Value::Object(update), None))
            }
            Operator::Subgraph(subgraph) => {
                let sub_thread = format!("subgraph_{}", subgraph.node_id);
                let (first, _) = subgraph.plan.next_from(START, &state);
                // Sub-graph steps stay on the parent's audit trail; the
                // checkpoints go to the derived thread.
                let final_state = self
                    .run_loop(
                        &subgraph.plan,
                        execution_id,
                        &sub_thread,
                        state.clone(),
                        first,
                        0,
                        cancel,
                    )
                    .await?;
                let sub_output = final_state.get("output").cloned().unwrap_or(Value::Null);
                let mut intermediate = Map::new();
                intermediate.insert(subgraph.node_id.clone(), sub_output.clone());
                Ok((
                    json!({
                        "current_node": subgraph.node_id.clone(),
                        "intermediate": intermediate,
                        "output": sub_output,
                    }),
                    None,
                ))
            }
            Operator::Parallel(_) => Err(GraphError::Execution(
                "parallel operator cannot be invoked directly".to_string(),
            )),
        }
    }

    async fn fail_step(&self, step_id: Uuid, node_id: &str, error: GraphError) -> Result<Value> {
        if error.is_cancellation() {
            self.journal.step_cancelled(step_id).await?;
            return Err(error);
        }
        let message = error.to_string();
        self.journal.step_failed(step_id, &message).await?;
        Err(GraphError::NodeExecution {
            node: node_id.to_string(),
            error: message,
        })
    }

    async fn cancel_steps(&self, steps: &[Uuid]) {
        for step in steps {
            if let Err(e) = self.journal.step_cancelled(*step).await {
                warn!(step = %step, "failed to mark step cancelled: {}", e);
            }
        }
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

/// Build the send list for a parallel dispatch. Dynamic fan-out reads the
/// item list from `state[fan_out_key]`, falling back to
/// `state.input[fan_out_key]`; each sibling payload is an isolated copy of
/// the state with `parallel_item` and `parallel_index` folded in.
fn build_sends(parallel: &ParallelOperator, state: &Value) -> Vec<NodeSend> {
    let mut sends = Vec::new();

    match &parallel.fan_out_key {
        Some(key) => {
            let items = state
                .get(key)
                .filter(|v| !v.is_null())
                .or_else(|| state.get("input").and_then(|input| input.get(key)));
            let Some(Value::Array(items)) = items else {
                warn!(key, "fan_out_key does not resolve to a list; nothing dispatched");
                return sends;
            };
            for (index, item) in items.iter().enumerate() {
                for target in &parallel.targets {
                    let mut payload = state.clone();
                    if let Some(obj) = payload.as_object_mut() {
                        obj.insert("parallel_item".to_string(), item.clone());
                        obj.insert("parallel_index".to_string(), json!(index));
                        let metadata = obj
                            .entry("metadata".to_string())
                            .or_insert_with(|| json!({}));
                        if let Some(meta) = metadata.as_object_mut() {
                            meta.insert("parallel_item".to_string(), item.clone());
                            meta.insert("parallel_index".to_string(), json!(index));
                        }
                    }
                    sends.push(NodeSend::new(target.clone(), payload));
                }
            }
        }
        None => {
            for target in &parallel.targets {
                sends.push(NodeSend::new(target.clone(), state.clone()));
            }
        }
    }

    sends
}

/// What a sibling step records as its input: the fan-out item, not the whole
/// payload snapshot.
fn sibling_input(payload: &Value) -> Value {
    match payload.get("parallel_item") {
        Some(item) if !item.is_null() => json!({
            "parallel_item": item,
            "parallel_index": payload.get("parallel_index").cloned().unwrap_or(Value::Null),
        }),
        _ => Value::Null,
    }
}

/// Fold a sibling's partial update into shared state. Only commutative keys
/// merge back; `output`, `current_node`, and `error` are per-branch scratch
/// that the join republishes. A non-commutative key written by two siblings
/// of the same barrier fails the execution.
fn fold_sibling(
    schema: &StateSchema,
    state: &mut Value,
    partial: &Value,
    scalar_claims: &mut HashMap<String, String>,
    node_id: &str,
) -> Result<()> {
    let Some(partial_obj) = partial.as_object() else {
        return Ok(());
    };

    let mut mergeable = Map::new();
    for (key, value) in partial_obj {
        if matches!(key.as_str(), "output" | "current_node" | "error") {
            continue;
        }
        if !schema.is_commutative(key) {
            if let Some(previous) = scalar_claims.insert(key.clone(), node_id.to_string()) {
                return Err(GraphError::Execution(format!(
                    "parallel siblings '{}' and '{}' both wrote non-commutative state key '{}'",
                    previous, node_id, key
                )));
            }
        }
        mergeable.insert(key.clone(), value.clone());
    }

    schema.apply(state, &Value::Object(mergeable))?;
    Ok(())
}

fn join_errors(a: Option<String>, b: Option<String>) -> Option<String> {
    match (a, b) {
        (Some(a), Some(b)) => Some(format!("{}; {}", a, b)),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}

impl JoinOperator {
    /// Collect sibling values in declaration order. A source that fanned out
    /// dynamically stored one entry per item under `{source}:{index}`; those
    /// are gathered in index order.
    fn collect(&self, intermediate: &Map<String, Value>) -> Vec<Value> {
        let mut values = Vec::new();
        for source in &self.sources {
            if let Some(value) = intermediate.get(source) {
                values.push(value.clone());
                continue;
            }
            let mut index = 0usize;
            while let Some(value) = intermediate.get(&format!("{}:{}", source, index)) {
                values.push(value.clone());
                index += 1;
            }
        }
        values
    }

    /// Aggregate `state.intermediate` (restricted to this join's sources)
    /// according to the strategy.
    pub fn aggregate(&self, state: &Value) -> Value {
        let empty = Map::new();
        let intermediate = state
            .get("intermediate")
            .and_then(Value::as_object)
            .unwrap_or(&empty);
        let values = self.collect(intermediate);

        match self.strategy {
            JoinStrategy::Merge => {
                let mut merged = Map::new();
                for (position, value) in values.iter().enumerate() {
                    match value {
                        Value::Object(map) => {
                            for (k, v) in map {
                                merged.insert(k.clone(), v.clone());
                            }
                        }
                        other => {
                            let key = self
                                .sources
                                .get(position)
                                .cloned()
                                .unwrap_or_else(|| position.to_string());
                            merged.insert(key, other.clone());
                        }
                    }
                }
                Value::Object(merged)
            }
            JoinStrategy::List => Value::Array(values),
            JoinStrategy::Concat => {
                let parts: Vec<String> = values
                    .iter()
                    .filter(|v| !v.is_null())
                    .map(value_to_text)
                    .collect();
                Value::String(parts.join("\n"))
            }
            JoinStrategy::First => values
                .into_iter()
                .find(|v| !v.is_null())
                .unwrap_or(Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(strategy: JoinStrategy, sources: &[&str]) -> JoinOperator {
        JoinOperator {
            strategy,
            output_key: "results".to_string(),
            sources: sources.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_join_list_declaration_order() {
        let state = json!({"intermediate": {"y": "2", "x": "1", "z": "3"}});
        let op = join(JoinStrategy::List, &["x", "y", "z"]);
        assert_eq!(op.aggregate(&state), json!(["1", "2", "3"]));
    }

    #[test]
    fn test_join_list_dynamic_keys_in_index_order() {
        let state = json!({"intermediate": {"w:1": 20, "w:0": 10, "w:2": 30}});
        let op = join(JoinStrategy::List, &["w"]);
        assert_eq!(op.aggregate(&state), json!([10, 20, 30]));
    }

    #[test]
    fn test_join_merge() {
        let state = json!({"intermediate": {"a": {"x": 1}, "b": {"y": 2}, "c": "plain"}});
        let op = join(JoinStrategy::Merge, &["a", "b", "c"]);
        assert_eq!(op.aggregate(&state), json!({"x": 1, "y": 2, "c": "plain"}));
    }

    #[test]
    fn test_join_concat_skips_nulls() {
        let state = json!({"intermediate": {"a": "one", "b": null, "c": "three"}});
        let op = join(JoinStrategy::Concat, &["a", "b", "c"]);
        assert_eq!(op.aggregate(&state), json!("one\nthree"));
    }

    #[test]
    fn test_join_first_non_null() {
        let state = json!({"intermediate": {"a": null, "b": "found", "c": "later"}});
        let op = join(JoinStrategy::First, &["a", "b", "c"]);
        assert_eq!(op.aggregate(&state), json!("found"));
    }

    #[test]
    fn test_fold_sibling_drops_branch_scratch() {
        let schema = StateSchema::workflow_base();
        let mut state = json!({"intermediate": {}, "output": null});
        let mut claims = HashMap::new();

        fold_sibling(
            &schema,
            &mut state,
            &json!({"intermediate": {"x": "1"}, "output": "1", "current_node": "x"}),
            &mut claims,
            "x",
        )
        .unwrap();
        fold_sibling(
            &schema,
            &mut state,
            &json!({"intermediate": {"y": "2"}, "output": "2", "current_node": "y"}),
            &mut claims,
            "y",
        )
        .unwrap();

        assert_eq!(state["intermediate"], json!({"x": "1", "y": "2"}));
        assert_eq!(state["output"], Value::Null);
    }

    #[test]
    fn test_fold_sibling_scalar_conflict() {
        let schema = StateSchema::workflow_base();
        let mut state = json!({});
        let mut claims = HashMap::new();

        fold_sibling(&schema, &mut state, &json!({"verdict": "a"}), &mut claims, "x").unwrap();
        let err = fold_sibling(&schema, &mut state, &json!({"verdict": "b"}), &mut claims, "y")
            .unwrap_err();
        assert!(err.to_string().contains("non-commutative"));
    }

    #[test]
    fn test_build_sends_static() {
        let parallel = ParallelOperator {
            targets: vec!["x".to_string(), "y".to_string()],
            fan_out_key: None,
            barrier: Some("j".to_string()),
        };
        let sends = build_sends(&parallel, &json!({"input": {}}));
        assert_eq!(sends.len(), 2);
        assert_eq!(sends[0].target, "x");
        assert!(sends[0].payload.get("parallel_item").is_none());
    }

    #[test]
    fn test_build_sends_dynamic_from_input() {
        let parallel = ParallelOperator {
            targets: vec!["w".to_string()],
            fan_out_key: Some("items".to_string()),
            barrier: Some("j".to_string()),
        };
        let sends = build_sends(&parallel, &json!({"input": {"items": [10, 20, 30]}}));
        assert_eq!(sends.len(), 3);
        assert_eq!(sends[1].payload["parallel_item"], json!(20));
        assert_eq!(sends[1].payload["parallel_index"], json!(1));
        assert_eq!(sends[2].payload["metadata"]["parallel_index"], json!(2));
    }

    #[test]
    fn test_build_sends_missing_key() {
        let parallel = ParallelOperator {
            targets: vec!["w".to_string()],
            fan_out_key: Some("items".to_string()),
            barrier: None,
        };
        assert!(build_sends(&parallel, &json!({"input": {}})).is_empty());
    }
}
