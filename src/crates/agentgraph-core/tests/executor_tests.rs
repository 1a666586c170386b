//! End-to-end executor tests with deterministic provider stubs.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use agentgraph_checkpoint::{Checkpointer, InMemoryCheckpointer};
use agentgraph_core::agent::MAX_ITERATIONS_OUTPUT;
use agentgraph_core::error::{GraphError, Result};
use agentgraph_core::event::{self, ExecutionEvent};
use agentgraph_core::graph::{
    EdgeDef, JoinStrategy, NodeDef, NodeKind, WorkflowDef, END, START,
};
use agentgraph_core::journal::{ExecutionStatus, MemoryJournal};
use agentgraph_core::llm::{ChatProvider, Completion, CompletionRequest, ContentStream};
use agentgraph_core::plan::{AgentBinding, AgentResolver, Compiler};
use agentgraph_core::tool::{Tool, ToolError, ToolResult};
use agentgraph_core::{Executor, Message, ToolCallRequest};

/// Provider stub driven by a closure over the request.
struct FnProvider<F>(F);

#[async_trait]
impl<F> ChatProvider for FnProvider<F>
where
    F: Fn(&CompletionRequest) -> Result<Completion> + Send + Sync,
{
    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        (self.0)(&request)
    }

    async fn stream_complete(&self, _request: CompletionRequest) -> Result<ContentStream> {
        Err(GraphError::Provider("stub does not stream".to_string()))
    }

    fn provider_name(&self) -> &str {
        "stub"
    }
}

fn provider<F>(f: F) -> Arc<dyn ChatProvider>
where
    F: Fn(&CompletionRequest) -> Result<Completion> + Send + Sync + 'static,
{
    Arc::new(FnProvider(f))
}

/// Fixed completion provider.
fn fixed(content: &str) -> Arc<dyn ChatProvider> {
    let content = content.to_string();
    provider(move |_| Ok(Completion::text(content.clone())))
}

/// Provider that answers after an async delay.
struct SlowProvider {
    delay_ms: u64,
    content: String,
}

#[async_trait]
impl ChatProvider for SlowProvider {
    async fn complete(&self, _request: CompletionRequest) -> Result<Completion> {
        tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        Ok(Completion::text(self.content.clone()))
    }

    async fn stream_complete(&self, _request: CompletionRequest) -> Result<ContentStream> {
        Err(GraphError::Provider("stub does not stream".to_string()))
    }

    fn provider_name(&self) -> &str {
        "slow-stub"
    }
}

/// Last user-turn content of a request.
fn user_content(request: &CompletionRequest) -> String {
    request
        .messages
        .iter()
        .rev()
        .find_map(|m| match m {
            Message::User { content } => Some(content.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

/// Extract a section body from the composed agent context.
fn section<'a>(content: &'a str, header_prefix: &str) -> Option<&'a str> {
    let start = content.find(header_prefix)?;
    let rest = &content[start..];
    let body_start = rest.find('\n')? + 1;
    let body = &rest[body_start..];
    Some(body.split("\n\n").next().unwrap_or(body))
}

struct StaticResolver {
    agents: Mutex<HashMap<Uuid, AgentBinding>>,
    workflows: HashMap<Uuid, WorkflowDef>,
}

impl StaticResolver {
    fn new() -> Self {
        Self {
            agents: Mutex::new(HashMap::new()),
            workflows: HashMap::new(),
        }
    }

    fn add_agent(&self, binding: AgentBinding) -> Uuid {
        let id = Uuid::new_v4();
        self.agents.lock().unwrap().insert(id, binding);
        id
    }
}

#[async_trait]
impl AgentResolver for StaticResolver {
    async fn resolve_agent(&self, agent_id: Uuid) -> Result<AgentBinding> {
        let agents = self.agents.lock().unwrap();
        let binding = agents.get(&agent_id).ok_or(GraphError::NotFound {
            kind: "Agent",
            id: agent_id.to_string(),
        })?;
        Ok(AgentBinding {
            name: binding.name.clone(),
            instructions: binding.instructions.clone(),
            provider: binding.provider.clone(),
            model: binding.model.clone(),
            max_tokens: binding.max_tokens,
            tools: binding.tools.clone(),
            output_schema: binding.output_schema.clone(),
        })
    }

    async fn load_workflow(&self, workflow_id: Uuid) -> Result<WorkflowDef> {
        self.workflows
            .get(&workflow_id)
            .cloned()
            .ok_or(GraphError::NotFound {
                kind: "Workflow",
                id: workflow_id.to_string(),
            })
    }
}

fn binding(provider: Arc<dyn ChatProvider>) -> AgentBinding {
    AgentBinding {
        name: "agent".to_string(),
        instructions: "Do the task.".to_string(),
        provider,
        model: "stub-1".to_string(),
        max_tokens: None,
        tools: Vec::new(),
        output_schema: None,
    }
}

fn agent_node(id: &str, agent_id: Uuid) -> NodeDef {
    NodeDef {
        node_id: id.to_string(),
        kind: NodeKind::Agent { agent_id },
        config: json!({}),
    }
}

struct Harness {
    journal: Arc<MemoryJournal>,
    checkpointer: Arc<InMemoryCheckpointer>,
    executor: Executor,
    events: Arc<Mutex<Vec<ExecutionEvent>>>,
}

fn harness() -> Harness {
    let checkpointer = Arc::new(InMemoryCheckpointer::new());
    let journal = Arc::new(MemoryJournal::new(checkpointer.clone()));
    let (tx, mut rx) = event::channel();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            sink.lock().unwrap().push(event);
        }
    });
    Harness {
        journal: journal.clone(),
        checkpointer,
        executor: Executor::new(journal).with_events(tx),
        events,
    }
}

// Scenario: linear two-agent chain. A always answers "42"; B appends "!" to
// whatever A produced.
#[tokio::test]
async fn linear_two_agent_chain() {
    let resolver = StaticResolver::new();
    let a = resolver.add_agent(binding(fixed("42")));
    let b = resolver.add_agent(binding(provider(|request| {
        let content = user_content(request);
        let upstream = section(&content, "## Output from a").unwrap_or("").trim();
        Ok(Completion::text(format!("{}!", upstream)))
    })));

    let def = WorkflowDef {
        id: Uuid::new_v4(),
        name: "chain".to_string(),
        state_schema: None,
        nodes: vec![agent_node("a", a), agent_node("b", b)],
        edges: vec![
            EdgeDef::direct(START, "a"),
            EdgeDef::direct("a", "b"),
            EdgeDef::direct("b", END),
        ],
        is_template: false,
    };

    let h = harness();
    let plan = Compiler::new(&resolver).compile(&def).await.unwrap();
    let execution_id = Uuid::new_v4();
    let final_state = h
        .executor
        .run(
            &plan,
            execution_id,
            "t-linear",
            json!({}),
            json!({}),
            Arc::new(AtomicBool::new(false)),
        )
        .await
        .unwrap();

    assert_eq!(final_state["output"], json!("42!"));
    assert_eq!(final_state["intermediate"]["a"], json!("42"));
    assert_eq!(final_state["intermediate"]["b"], json!("42!"));

    let steps = h.journal.steps_for(execution_id);
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].node_id, "a");
    assert_eq!(steps[1].node_id, "b");
    assert!(steps.iter().all(|s| s.status == ExecutionStatus::Completed));
    assert!(steps
        .iter()
        .all(|s| s.started_at <= s.completed_at.unwrap()));

    // Snapshot after every fold.
    assert_eq!(h.checkpointer.snapshot_count("t-linear").await, 2);

    tokio::task::yield_now().await;
    let events = h.events.lock().unwrap();
    let kinds: Vec<&str> = events.iter().map(|e| e.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            "execution_started",
            "node_start",
            "node_complete",
            "node_start",
            "node_complete",
            "execution_complete",
        ]
    );
}

fn router_def(resolver: &StaticResolver, score: f64, condition_high: &str) -> WorkflowDef {
    let score_text = format!("{{\"score\": {}}}", score);
    let r = resolver.add_agent(AgentBinding {
        output_schema: Some(json!({"type": "object"})),
        ..binding(fixed(&score_text))
    });
    let high = resolver.add_agent(binding(fixed("high")));
    let mid = resolver.add_agent(binding(fixed("mid")));
    let low = resolver.add_agent(binding(fixed("low")));

    WorkflowDef {
        id: Uuid::new_v4(),
        name: "routed".to_string(),
        state_schema: None,
        nodes: vec![
            agent_node("r", r),
            agent_node("high", high),
            agent_node("mid", mid),
            agent_node("low", low),
        ],
        edges: vec![
            EdgeDef::direct(START, "r"),
            EdgeDef::conditional("r", "high", condition_high),
            EdgeDef::conditional("r", "mid", "state['intermediate']['r']['score'] > 0.5"),
            EdgeDef::direct("r", "low"),
            EdgeDef::direct("high", END),
            EdgeDef::direct("mid", END),
            EdgeDef::direct("low", END),
        ],
        is_template: false,
    }
}

// Scenario: conditional routing takes the first true condition in
// declaration order, or the default.
#[tokio::test]
async fn router_picks_declaration_order_first_true() {
    let resolver = StaticResolver::new();
    let def = router_def(&resolver, 0.6, "state['intermediate']['r']['score'] > 0.8");

    let h = harness();
    let plan = Compiler::new(&resolver).compile(&def).await.unwrap();
    let execution_id = Uuid::new_v4();
    let state = h
        .executor
        .run(&plan, execution_id, "t-mid", json!({}), json!({}), Arc::new(AtomicBool::new(false)))
        .await
        .unwrap();

    assert_eq!(state["output"], json!("mid"));
    let steps = h.journal.steps_for(execution_id);
    assert_eq!(steps[1].node_id, "mid");
}

#[tokio::test]
async fn router_falls_back_to_default() {
    let resolver = StaticResolver::new();
    let def = router_def(&resolver, 0.3, "state['intermediate']['r']['score'] > 0.8");

    let h = harness();
    let plan = Compiler::new(&resolver).compile(&def).await.unwrap();
    let execution_id = Uuid::new_v4();
    let state = h
        .executor
        .run(&plan, execution_id, "t-low", json!({}), json!({}), Arc::new(AtomicBool::new(false)))
        .await
        .unwrap();

    assert_eq!(state["output"], json!("low"));
}

// Scenario: a malformed condition degrades to the default route; the error
// lands on the step, which stays completed.
#[tokio::test]
async fn malformed_condition_takes_default_and_records_error() {
    let resolver = StaticResolver::new();
    let def = router_def(&resolver, 0.6, "state.score >> 0.8");

    let h = harness();
    let plan = Compiler::new(&resolver).compile(&def).await.unwrap();
    let execution_id = Uuid::new_v4();
    let state = h
        .executor
        .run(&plan, execution_id, "t-bad", json!({}), json!({}), Arc::new(AtomicBool::new(false)))
        .await
        .unwrap();

    // The well-formed mid condition still matches 0.6.
    assert_eq!(state["output"], json!("mid"));

    let steps = h.journal.steps_for(execution_id);
    let r_step = steps.iter().find(|s| s.node_id == "r").unwrap();
    assert_eq!(r_step.status, ExecutionStatus::Completed);
    assert!(r_step.error_message.as_ref().unwrap().contains("failed to parse"));
}

fn fanout_def(resolver: &StaticResolver) -> WorkflowDef {
    let x = resolver.add_agent(binding(fixed("x")));
    let y = resolver.add_agent(binding(fixed("y")));
    let z = resolver.add_agent(binding(fixed("z")));

    WorkflowDef {
        id: Uuid::new_v4(),
        name: "fanout".to_string(),
        state_schema: None,
        nodes: vec![
            NodeDef {
                node_id: "p".to_string(),
                kind: NodeKind::Parallel {
                    parallel_nodes: vec!["x".to_string(), "y".to_string(), "z".to_string()],
                    fan_out_key: None,
                },
                config: json!({}),
            },
            agent_node("x", x),
            agent_node("y", y),
            agent_node("z", z),
            NodeDef {
                node_id: "j".to_string(),
                kind: NodeKind::Join {
                    strategy: JoinStrategy::List,
                    output_key: "results".to_string(),
                },
                config: json!({}),
            },
        ],
        edges: vec![
            EdgeDef::direct(START, "p"),
            EdgeDef::direct("x", "j"),
            EdgeDef::direct("y", "j"),
            EdgeDef::direct("z", "j"),
            EdgeDef::direct("j", END),
        ],
        is_template: false,
    }
}

// Scenario: static fan-out of three siblings joined with the list strategy.
// The join runs exactly once, after every sibling folded, and preserves
// declaration order.
#[tokio::test]
async fn static_fanout_join_list() {
    let resolver = StaticResolver::new();
    let def = fanout_def(&resolver);

    let h = harness();
    let plan = Compiler::new(&resolver).compile(&def).await.unwrap();
    let execution_id = Uuid::new_v4();
    let state = h
        .executor
        .run(&plan, execution_id, "t-fan", json!({}), json!({}), Arc::new(AtomicBool::new(false)))
        .await
        .unwrap();

    assert_eq!(state["output"], json!(["x", "y", "z"]));
    assert_eq!(state["results"], json!(["x", "y", "z"]));

    let steps = h.journal.steps_for(execution_id);
    let join_runs = steps.iter().filter(|s| s.node_id == "j").count();
    assert_eq!(join_runs, 1);

    // Siblings fold before the join executes.
    let join_position = steps.iter().position(|s| s.node_id == "j").unwrap();
    for sibling in ["x", "y", "z"] {
        let position = steps.iter().position(|s| s.node_id == sibling).unwrap();
        assert!(position < join_position);
    }
}

// Scenario: dynamic fan-out over input.items with one worker node; each
// invocation sees its own parallel_item/parallel_index.
#[tokio::test]
async fn dynamic_fanout_over_input_items() {
    let resolver = StaticResolver::new();
    let w = resolver.add_agent(AgentBinding {
        output_schema: Some(json!({"type": "number"})),
        ..binding(provider(|request| {
            let content = user_content(request);
            let item = section(&content, "## Current Task").unwrap_or("0").trim();
            Ok(Completion::text(item.to_string()))
        }))
    });

    let def = WorkflowDef {
        id: Uuid::new_v4(),
        name: "dynamic".to_string(),
        state_schema: None,
        nodes: vec![
            NodeDef {
                node_id: "p".to_string(),
                kind: NodeKind::Parallel {
                    parallel_nodes: vec!["w".to_string()],
                    fan_out_key: Some("items".to_string()),
                },
                config: json!({}),
            },
            agent_node("w", w),
            NodeDef {
                node_id: "j".to_string(),
                kind: NodeKind::Join {
                    strategy: JoinStrategy::List,
                    output_key: "results".to_string(),
                },
                config: json!({}),
            },
        ],
        edges: vec![
            EdgeDef::direct(START, "p"),
            EdgeDef::direct("w", "j"),
            EdgeDef::direct("j", END),
        ],
        is_template: false,
    };

    let h = harness();
    let plan = Compiler::new(&resolver).compile(&def).await.unwrap();
    let execution_id = Uuid::new_v4();
    let state = h
        .executor
        .run(
            &plan,
            execution_id,
            "t-dyn",
            json!({"items": [10, 20, 30]}),
            json!({}),
            Arc::new(AtomicBool::new(false)),
        )
        .await
        .unwrap();

    assert_eq!(state["output"], json!([10, 20, 30]));

    let steps = h.journal.steps_for(execution_id);
    let w_steps: Vec<_> = steps.iter().filter(|s| s.node_id == "w").collect();
    assert_eq!(w_steps.len(), 3);
    let mut indices: Vec<u64> = w_steps
        .iter()
        .map(|s| s.input_data.as_ref().unwrap()["parallel_index"].as_u64().unwrap())
        .collect();
    indices.sort_unstable();
    assert_eq!(indices, vec![0, 1, 2]);
}

// Scenario: sub-graph embedding. The inner workflow's output becomes the
// outer node's intermediate entry, and the inner run checkpoints under the
// derived thread id.
#[tokio::test]
async fn subgraph_embedding() {
    let mut resolver = StaticResolver::new();
    let inner_agent = resolver.add_agent(binding(fixed("inner-ok")));
    let inner_id = Uuid::new_v4();
    let inner = WorkflowDef {
        id: inner_id,
        name: "inner".to_string(),
        state_schema: None,
        nodes: vec![agent_node("i", inner_agent)],
        edges: vec![EdgeDef::direct(START, "i"), EdgeDef::direct("i", END)],
        is_template: false,
    };
    resolver.workflows.insert(inner_id, inner);

    let outer = WorkflowDef {
        id: Uuid::new_v4(),
        name: "outer".to_string(),
        state_schema: None,
        nodes: vec![NodeDef {
            node_id: "s".to_string(),
            kind: NodeKind::Subgraph {
                subgraph_workflow_id: inner_id,
            },
            config: json!({}),
        }],
        edges: vec![EdgeDef::direct(START, "s"), EdgeDef::direct("s", END)],
        is_template: false,
    };

    let h = harness();
    let plan = Compiler::new(&resolver).compile(&outer).await.unwrap();
    let execution_id = Uuid::new_v4();
    let state = h
        .executor
        .run(&plan, execution_id, "t-outer", json!({}), json!({}), Arc::new(AtomicBool::new(false)))
        .await
        .unwrap();

    assert_eq!(state["output"], json!("inner-ok"));
    assert_eq!(state["intermediate"]["s"], json!("inner-ok"));

    // Inner run checkpointed under the derived thread id.
    let snapshot = h.checkpointer.load_latest("subgraph_s").await.unwrap();
    assert!(snapshot.is_some());
}

// Scenario: cancel mid-flight. The flag flips while A's provider call is in
// the air; B never starts and the stream ends without execution_complete.
#[tokio::test]
async fn cancel_mid_flight() {
    let resolver = StaticResolver::new();
    let a = resolver.add_agent(binding(Arc::new(SlowProvider {
        delay_ms: 5,
        content: "slow".to_string(),
    })));
    let b = resolver.add_agent(binding(fixed("never")));

    let def = WorkflowDef {
        id: Uuid::new_v4(),
        name: "cancelled".to_string(),
        state_schema: None,
        nodes: vec![agent_node("a", a), agent_node("b", b)],
        edges: vec![
            EdgeDef::direct(START, "a"),
            EdgeDef::direct("a", "b"),
            EdgeDef::direct("b", END),
        ],
        is_template: false,
    };

    let h = harness();
    let plan = Compiler::new(&resolver).compile(&def).await.unwrap();
    let execution_id = Uuid::new_v4();
    let cancel = Arc::new(AtomicBool::new(false));
    cancel.store(true, Ordering::SeqCst);

    // Flag is already set when the loop first observes it; the exact step A
    // lands in depends on where the flag is noticed, B must never start.
    let err = h
        .executor
        .run(&plan, execution_id, "t-cancel", json!({}), json!({}), cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancellation());

    let steps = h.journal.steps_for(execution_id);
    assert!(steps.iter().all(|s| s.node_id != "b"));

    tokio::task::yield_now().await;
    let events = h.events.lock().unwrap();
    assert!(events.iter().all(|e| e.kind() != "execution_complete"));
}

struct FlakyTool;

#[async_trait]
impl Tool for FlakyTool {
    fn name(&self) -> &str {
        "flaky"
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn schema(&self) -> Value {
        json!({"type": "object"})
    }

    async fn invoke(&self, _args: Value) -> ToolResult<Value> {
        Err(ToolError::ExecutionFailed {
            tool: "flaky".to_string(),
            message: "backend unavailable".to_string(),
        })
    }
}

fn tool_call(name: &str) -> ToolCallRequest {
    ToolCallRequest {
        id: "call_1".to_string(),
        name: name.to_string(),
        arguments: "{}".to_string(),
    }
}

// A failing tool becomes an error tool turn; the node still completes.
#[tokio::test]
async fn tool_error_is_recovered_in_loop() {
    let resolver = StaticResolver::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in_stub = calls.clone();
    let a = resolver.add_agent(AgentBinding {
        tools: vec![Arc::new(FlakyTool)],
        ..binding(provider(move |request| {
            if calls_in_stub.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(Completion {
                    tool_calls: vec![tool_call("flaky")],
                    ..Completion::text("")
                })
            } else {
                // Echo back what the tool turn reported.
                let last_tool = request
                    .messages
                    .iter()
                    .rev()
                    .find_map(|m| match m {
                        Message::Tool { content, .. } => Some(content.clone()),
                        _ => None,
                    })
                    .unwrap_or_default();
                Ok(Completion::text(last_tool))
            }
        }))
    });

    let def = WorkflowDef {
        id: Uuid::new_v4(),
        name: "tool-error".to_string(),
        state_schema: None,
        nodes: vec![agent_node("a", a)],
        edges: vec![EdgeDef::direct(START, "a"), EdgeDef::direct("a", END)],
        is_template: false,
    };

    let h = harness();
    let plan = Compiler::new(&resolver).compile(&def).await.unwrap();
    let execution_id = Uuid::new_v4();
    let state = h
        .executor
        .run(&plan, execution_id, "t-tool", json!({}), json!({}), Arc::new(AtomicBool::new(false)))
        .await
        .unwrap();

    let output = state["output"].as_str().unwrap();
    assert!(output.contains("Error executing tool flaky"));
    assert!(output.contains("backend unavailable"));
    assert_eq!(
        h.journal.steps_for(execution_id)[0].status,
        ExecutionStatus::Completed
    );
}

// The loop stops at MAX_TOOL_ITERATIONS with the sentinel output; the step
// is completed, not failed.
#[tokio::test]
async fn agent_loop_iteration_bound() {
    struct NoopTool;

    #[async_trait]
    impl Tool for NoopTool {
        fn name(&self) -> &str {
            "noop"
        }
        fn description(&self) -> &str {
            "Does nothing"
        }
        fn schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn invoke(&self, _args: Value) -> ToolResult<Value> {
            Ok(json!("ok"))
        }
    }

    let resolver = StaticResolver::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let a = resolver.add_agent(AgentBinding {
        tools: vec![Arc::new(NoopTool)],
        ..binding(provider(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Completion {
                tool_calls: vec![tool_call("noop")],
                ..Completion::text("")
            })
        }))
    });

    let def = WorkflowDef {
        id: Uuid::new_v4(),
        name: "looping".to_string(),
        state_schema: None,
        nodes: vec![agent_node("a", a)],
        edges: vec![EdgeDef::direct(START, "a"), EdgeDef::direct("a", END)],
        is_template: false,
    };

    let h = harness();
    let plan = Compiler::new(&resolver).compile(&def).await.unwrap();
    let execution_id = Uuid::new_v4();
    let state = h
        .executor
        .run(&plan, execution_id, "t-loop", json!({}), json!({}), Arc::new(AtomicBool::new(false)))
        .await
        .unwrap();

    assert_eq!(state["output"], json!(MAX_ITERATIONS_OUTPUT));
    assert_eq!(calls.load(Ordering::SeqCst), 10);
    assert_eq!(
        h.journal.steps_for(execution_id)[0].status,
        ExecutionStatus::Completed
    );
}

// Resume after a mid-workflow failure: the snapshot restores state after A,
// and only B and C run on the second attempt.
#[tokio::test]
async fn resume_after_failure_skips_completed_nodes() {
    let resolver = StaticResolver::new();
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_in_stub = attempts.clone();

    let a = resolver.add_agent(binding(fixed("step-a")));
    let b = resolver.add_agent(binding(provider(move |_| {
        if attempts_in_stub.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(GraphError::Provider("rate limited".to_string()))
        } else {
            Ok(Completion::text("step-b"))
        }
    })));
    let c = resolver.add_agent(binding(fixed("step-c")));

    let def = WorkflowDef {
        id: Uuid::new_v4(),
        name: "resumable".to_string(),
        state_schema: None,
        nodes: vec![agent_node("a", a), agent_node("b", b), agent_node("c", c)],
        edges: vec![
            EdgeDef::direct(START, "a"),
            EdgeDef::direct("a", "b"),
            EdgeDef::direct("b", "c"),
            EdgeDef::direct("c", END),
        ],
        is_template: false,
    };

    let h = harness();
    let plan = Compiler::new(&resolver).compile(&def).await.unwrap();
    let execution_id = Uuid::new_v4();
    let cancel = Arc::new(AtomicBool::new(false));

    let err = h
        .executor
        .run(&plan, execution_id, "t-resume", json!({}), json!({}), cancel.clone())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("rate limited"));

    let first_steps = h.journal.steps_for(execution_id);
    assert_eq!(first_steps.len(), 2);
    assert_eq!(first_steps[1].status, ExecutionStatus::Failed);

    // Rebuild the frontier from the snapshot and the last completed node.
    let snapshot = h.checkpointer.load_latest("t-resume").await.unwrap().unwrap();
    let last_completed = first_steps
        .iter()
        .rev()
        .find(|s| s.status == ExecutionStatus::Completed)
        .map(|s| s.node_id.clone())
        .unwrap();
    assert_eq!(last_completed, "a");

    let state = h
        .executor
        .resume(
            &plan,
            execution_id,
            "t-resume",
            snapshot.state,
            Some(&last_completed),
            snapshot.step_index + 1,
            cancel,
        )
        .await
        .unwrap();

    assert_eq!(state["output"], json!("step-c"));
    assert_eq!(state["intermediate"]["a"], json!("step-a"));

    let all_steps = h.journal.steps_for(execution_id);
    let a_runs = all_steps.iter().filter(|s| s.node_id == "a").count();
    assert_eq!(a_runs, 1);
}

// Per-node wall-clock budget fails the step with the timeout message.
#[tokio::test]
async fn node_timeout_fails_execution() {
    let resolver = StaticResolver::new();
    let a = resolver.add_agent(binding(Arc::new(SlowProvider {
        delay_ms: 1500,
        content: "too slow".to_string(),
    })));

    let def = WorkflowDef {
        id: Uuid::new_v4(),
        name: "slow".to_string(),
        state_schema: None,
        nodes: vec![NodeDef {
            node_id: "a".to_string(),
            kind: NodeKind::Agent { agent_id: a },
            config: json!({"timeout_seconds": 1}),
        }],
        edges: vec![EdgeDef::direct(START, "a"), EdgeDef::direct("a", END)],
        is_template: false,
    };

    let h = harness();
    let plan = Compiler::new(&resolver).compile(&def).await.unwrap();
    let execution_id = Uuid::new_v4();
    let err = h
        .executor
        .run(&plan, execution_id, "t-slow", json!({}), json!({}), Arc::new(AtomicBool::new(false)))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("node timeout"));
    let steps = h.journal.steps_for(execution_id);
    assert_eq!(steps[0].status, ExecutionStatus::Failed);
    assert_eq!(steps[0].error_message.as_deref(), Some("node timeout"));
}
