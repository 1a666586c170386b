//! Conversation message turns
//!
//! Messages use the canonical roles `system`, `user`, `assistant`, `tool` as
//! a closed sum type. Provider adapters translate these into their wire
//! shapes at the edge (e.g. Anthropic takes the system turn out-of-band and
//! renders tool results inside user turns).

use serde::{Deserialize, Serialize};

/// A single conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },
    Tool {
        tool_call_id: String,
        name: String,
        content: String,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn assistant_with_tools(
        content: impl Into<String>,
        tool_calls: Vec<ToolCallRequest>,
    ) -> Self {
        Message::Assistant {
            content: content.into(),
            tool_calls,
        }
    }

    pub fn tool(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Message::Tool {
            tool_call_id: tool_call_id.into(),
            name: name.into(),
            content: content.into(),
        }
    }

    /// Text content of the turn, regardless of role.
    pub fn content(&self) -> &str {
        match self {
            Message::System { content }
            | Message::User { content }
            | Message::Assistant { content, .. }
            | Message::Tool { content, .. } => content,
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Message::System { .. } => "system",
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::Tool { .. } => "tool",
        }
    }
}

/// A tool invocation requested by the model. `arguments` is the raw JSON
/// string exactly as the provider returned it; decoding happens in the agent
/// loop so malformed arguments can be reported back as a tool turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_tagging() {
        let msg = Message::user("hello");
        let encoded = serde_json::to_value(&msg).unwrap();
        assert_eq!(encoded["role"], "user");
        assert_eq!(encoded["content"], "hello");
    }

    #[test]
    fn test_assistant_tool_calls_omitted_when_empty() {
        let encoded = serde_json::to_value(Message::assistant("hi")).unwrap();
        assert!(encoded.get("tool_calls").is_none());
    }

    #[test]
    fn test_tool_turn_round_trip() {
        let msg = Message::tool("call_1", "calculator", "4");
        let decoded: Message =
            serde_json::from_value(serde_json::to_value(&msg).unwrap()).unwrap();
        assert_eq!(decoded, msg);
    }
}
