//! Data models shared by the streaming core and the session API.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Role of the message sender.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

/// A tool invocation requested by the assistant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,

    /// Arguments keyed by parameter name. The backend sends these as `args`.
    #[serde(default, rename = "args", alias = "arguments")]
    pub arguments: HashMap<String, Value>,
}

/// Input to a single streaming exchange.
///
/// `message` is forwarded as given; callers should reject blank input before
/// opening a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub session_id: Option<String>,
    pub message: String,
}

impl StreamRequest {
    /// Create a request that lets the backend allocate a new session.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            session_id: None,
            message: message.into(),
        }
    }

    /// Continue an existing session.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

impl From<&StreamRequest> for ChatRequest {
    fn from(request: &StreamRequest) -> Self {
        ChatRequest {
            session_id: request.session_id.clone(),
            message: request.message.clone(),
            stream: Some(true),
        }
    }
}

/// One decoded event from the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Incremental text fragment.
    Content { text: String },

    /// Logical completion of the exchange. `text` is the last fragment and may be empty.
    Final {
        text: String,
        tool_calls: Vec<ToolCall>,
    },

    /// A non-empty payload that was not a structured chunk.
    Raw { text: String },
}

impl StreamEvent {
    /// Text carried by the event, whatever its kind.
    pub fn text(&self) -> &str {
        match self {
            StreamEvent::Content { text }
            | StreamEvent::Final { text, .. }
            | StreamEvent::Raw { text } => text,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, StreamEvent::Final { .. })
    }
}

/// Structured payload of a `data:` record.
#[derive(Debug, Clone, Deserialize, Default)]
pub(crate) struct ChunkPayload {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub is_final: Option<bool>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ChunkPayload {
    pub(crate) fn into_event(self) -> StreamEvent {
        let text = self.content.unwrap_or_default();
        if self.is_final.unwrap_or(false) {
            StreamEvent::Final {
                text,
                tool_calls: self.tool_calls.unwrap_or_default(),
            }
        } else {
            StreamEvent::Content { text }
        }
    }
}

/// Caller-side accumulator for one streamed reply.
///
/// Concatenates every `Content` and `Raw` fragment and then the `Final` text,
/// and keeps the tool calls reported by `Final`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub complete: bool,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an event. Events after the final one are ignored.
    pub fn push(&mut self, event: &StreamEvent) {
        if self.complete {
            return;
        }
        match event {
            StreamEvent::Content { text } | StreamEvent::Raw { text } => {
                self.content.push_str(text);
            }
            StreamEvent::Final { text, tool_calls } => {
                self.content.push_str(text);
                self.tool_calls = tool_calls.clone();
                self.complete = true;
            }
        }
    }
}

// --- Session API wire types ---

/// Request body for the chat endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            session_id: None,
            message: message.into(),
            stream: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// A persisted chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    #[serde(default, deserialize_with = "opt_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub session_id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_results: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// A chat session record.
///
/// Timestamps are kept as the backend formats them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatSession {
    #[serde(deserialize_with = "id")]
    pub id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// Response of the non-streaming message endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub session_id: String,
    pub message: ChatMessage,
    #[serde(default = "default_true")]
    pub is_complete: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

// Backends disagree on whether record ids are numbers or strings.
fn id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    RawId::deserialize(deserializer).map(String::from)
}

fn opt_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<RawId>::deserialize(deserializer)?.map(String::from))
}
