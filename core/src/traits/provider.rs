use crate::traits::ToolSpec;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ChatMessage {
    System {
        text: String,
    },
    User {
        text: String,
    },
    #[serde(rename = "assistant")]
    Ai {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    #[serde(rename = "tool")]
    ToolResult {
        id: String,
        tool_name: String,
        text: String,
    },
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self::System { text: text.into() }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::User { text: text.into() }
    }

    pub fn ai(text: impl Into<String>) -> Self {
        Self::Ai {
            text: Some(text.into()),
            tool_calls: Vec::new(),
        }
    }

    /// An AI turn that asks for tools. Blank text is stored as `None`.
    pub fn ai_with_tool_calls(text: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Ai {
            text: text.filter(|t| !t.trim().is_empty()),
            tool_calls,
        }
    }

    pub fn tool_result(call: &ToolCall, text: impl Into<String>) -> Self {
        Self::ToolResult {
            id: call.id.clone(),
            tool_name: call.name.clone(),
            text: text.into(),
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Self::System { .. } => "system",
            Self::User { .. } => "user",
            Self::Ai { .. } => "assistant",
            Self::ToolResult { .. } => "tool",
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::System { text } | Self::User { text } | Self::ToolResult { text, .. } => {
                Some(text)
            }
            Self::Ai { text, .. } => text.as_deref(),
        }
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::Ai { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Self::System { .. })
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl ChatResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub messages: &'a [ChatMessage],
    pub tools: Option<&'a [ToolSpec]>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    Token(String),
    ToolCall(ToolCall),
    Done,
}

pub type EventStream = BoxStream<'static, anyhow::Result<ProviderEvent>>;

#[async_trait]
pub trait Provider: Send + Sync {
    async fn chat(&self, request: ChatRequest<'_>) -> anyhow::Result<ChatResponse>;

    /// Starts a streamed completion. The returned stream owns everything it
    /// needs and ends after a `Done` event or the first error.
    async fn chat_stream(&self, request: ChatRequest<'_>) -> anyhow::Result<EventStream>;

    fn supports_streaming(&self) -> bool {
        true
    }
}
