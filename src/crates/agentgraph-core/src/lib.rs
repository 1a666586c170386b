//! Core workflow compiler and executor for agentgraph
//!
//! agentgraph turns declarative workflow definitions - nodes, edges, a state
//! schema - into runnable computations. A definition is compiled into a
//! [`Plan`](plan::Plan) of operators and edge groups, and the
//! [`Executor`](executor::Executor) drives that plan: it schedules nodes,
//! threads a shared state through them with per-key reducer merge semantics,
//! fans out parallel work with [`Send`](send::Send) dispatch, joins branches
//! behind barriers, checkpoints after every fold so executions can resume,
//! and reports progress as a stream of typed events.
//!
//! The crate is deliberately free of transport and storage concerns. LLM
//! providers implement [`ChatProvider`](llm::ChatProvider), tools implement
//! [`Tool`](tool::Tool), persistence implements
//! [`RunJournal`](journal::RunJournal) plus the checkpointer trait from
//! `agentgraph-checkpoint`, and the HTTP layer drains the event channel.

pub mod agent;
pub mod error;
pub mod event;
pub mod executor;
pub mod expr;
pub mod graph;
pub mod journal;
pub mod llm;
pub mod messages;
pub mod plan;
pub mod send;
pub mod state;
pub mod tool;
pub mod validate;

pub use error::{GraphError, Result};
pub use event::{EventSender, ExecutionEvent};
pub use executor::Executor;
pub use journal::{ExecutionStatus, MemoryJournal, StepRecord};
pub use graph::{EdgeDef, JoinStrategy, NodeDef, NodeId, NodeKind, RouterConfig, WorkflowDef, END, START};
pub use journal::RunJournal;
pub use messages::{Message, ToolCallRequest};
pub use plan::{AgentBinding, AgentResolver, Compiler, Plan};
pub use send::Send;
pub use state::StateSchema;
pub use tool::{Tool, ToolError, ToolRegistry};

/// Upper bound on provider round-trips inside a single agent node.
pub const MAX_TOOL_ITERATIONS: usize = 10;

/// Truncation bound for a single tool output or intermediate value fed back
/// into an agent context (roughly 50-60k tokens of multilingual text).
pub const MAX_TOOL_OUTPUT_CHARS: usize = 180_000;
