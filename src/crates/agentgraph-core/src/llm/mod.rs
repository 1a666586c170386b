//! Provider-agnostic LLM interface
//!
//! agentgraph is an orchestration engine, not an LLM client library: the core
//! crate defines the [`ChatProvider`] trait and the request/response types,
//! and the `llm` crate ships adapters for the hosted providers. Anything that
//! can turn messages plus optional tool schemas into content (possibly with
//! tool-call requests) can drive an agent node.

pub mod request;
pub mod traits;

pub use request::{Completion, CompletionRequest, ContentStream, FinishReason, ToolSchema, Usage};
pub use traits::ChatProvider;
