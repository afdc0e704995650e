//! Conversation transcripts and the participant-invocation capability.
//!
//! The orchestration loops never talk to a model backend directly. They call
//! [`ChatDriver::invoke`] with a participant and a message, and get back a
//! [`ConversationResult`]: the ordered transcript of everything the
//! participant said and every raw tool output produced along the way. Tests
//! script this trait; production uses the rig-backed driver in [`crate::llm`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::contracts::WorkflowError;
use crate::participants::Participant;

/// What kind of transcript entry a turn is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnKind {
    /// A textual reply authored by a conversation participant.
    Reply,
    /// Raw output of a tool invocation, as returned by the tool.
    ToolResult,
}

/// One entry in a conversation transcript.
#[derive(Debug, Clone)]
pub struct Turn {
    pub author: String,
    pub text: String,
    pub kind: TurnKind,
}

impl Turn {
    pub fn reply(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
            kind: TurnKind::Reply,
        }
    }

    pub fn tool_result(text: impl Into<String>) -> Self {
        Self {
            author: "tool".into(),
            text: text.into(),
            kind: TurnKind::ToolResult,
        }
    }
}

/// Ordered transcript of one participant invocation.
#[derive(Debug, Clone, Default)]
pub struct ConversationResult {
    pub turns: Vec<Turn>,
}

impl ConversationResult {
    pub fn from_turns(turns: Vec<Turn>) -> Self {
        Self { turns }
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// All textual replies authored by the named participant, in order.
    pub fn replies_from(&self, author: &str) -> Vec<String> {
        self.turns
            .iter()
            .filter(|t| t.kind == TurnKind::Reply && t.author == author && !t.text.is_empty())
            .map(|t| t.text.clone())
            .collect()
    }

    /// All raw tool outputs in the transcript, in order.
    pub fn tool_outputs(&self) -> Vec<String> {
        self.turns
            .iter()
            .filter(|t| t.kind == TurnKind::ToolResult && !t.text.is_empty())
            .map(|t| t.text.clone())
            .collect()
    }
}

/// Failure of the underlying model-call mechanism.
#[derive(Debug, thiserror::Error)]
pub enum InvocationError {
    #[error("model call failed: {0}")]
    Completion(String),
    #[error("client construction failed: {0}")]
    Client(String),
}

/// Opaque capability for running one conversation with a participant.
///
/// `max_turns` bounds tool round trips for this invocation; `None` uses the
/// participant's own default.
#[async_trait]
pub trait ChatDriver: Send + Sync {
    async fn invoke(
        &self,
        participant: &Participant,
        message: &str,
        max_turns: Option<usize>,
    ) -> Result<ConversationResult, InvocationError>;
}

/// One inbound task message, as handed over by the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub role: String,
    pub content: MessageContent,
}

impl InboundMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "User".into(),
            content: MessageContent::Text(text.into()),
        }
    }
}

/// Message content: either plain text or a list of typed parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<MessagePart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// Extract the latest user-authored text from the inbound messages.
///
/// Multi-part content is concatenated; non-text parts are dropped with a
/// warning rather than an error.
pub fn extract_user_input(messages: &[InboundMessage]) -> Result<String, WorkflowError> {
    let last = messages
        .last()
        .ok_or_else(|| WorkflowError::new("Task input contained no messages."))?;

    match &last.content {
        MessageContent::Text(text) => Ok(text.clone()),
        MessageContent::Parts(parts) => {
            let mut combined = String::new();
            for part in parts {
                if part.kind == "text" {
                    if let Some(text) = &part.text {
                        combined.push_str(text);
                    }
                } else {
                    warn!(kind = %part.kind, "ignoring non-text content part");
                }
            }
            Ok(combined)
        }
    }
}
