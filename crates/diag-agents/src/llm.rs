//! Rig-backed implementation of the participant-invocation capability.
//!
//! One OpenAI-compatible completions client serves every participant; a
//! fresh rig agent is assembled per invocation from the participant's
//! preamble, temperature, and tool bundle. The prompt runs against an
//! externally owned history vector so the full transcript — assistant
//! replies and raw tool outputs — can be handed back to the orchestration
//! core as a [`ConversationResult`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use rig::agent::Agent;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::message::{AssistantContent, Message, ToolResultContent, UserContent};
use rig::providers::openai;

use crate::config::Settings;
use crate::conversation::{ChatDriver, ConversationResult, InvocationError, Turn, TurnKind};
use crate::participants::{Participant, ToolBundle};
use crate::tools::github_tools::{GetFileContentsTool, SearchCodeTool};
use crate::tools::kubectl_tool::KubectlTool;

/// Type alias for agents built from OpenAI-compatible endpoints.
pub type OaiAgent = Agent<openai::completion::CompletionModel>;

/// Chat driver backed by a rig OpenAI-compatible completions client.
pub struct RigChatDriver {
    client: openai::CompletionsClient,
    model: String,
    settings: Settings,
}

impl RigChatDriver {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = openai::CompletionsClient::builder()
            .api_key(&settings.llm_api_key)
            .base_url(&settings.llm_api_base)
            .build()
            .context("failed to build completions client")?;

        Ok(Self {
            client,
            model: settings.task_model_id.clone(),
            settings: settings.clone(),
        })
    }

    fn build_agent(&self, participant: &Participant) -> OaiAgent {
        let builder = self
            .client
            .agent(&self.model)
            .name(participant.name)
            .preamble(&participant.preamble)
            .temperature(participant.temperature);

        match participant.tools {
            ToolBundle::None => builder.build(),
            ToolBundle::Kubernetes => builder
                .tool(KubectlTool::new(&self.settings))
                .default_max_turns(participant.default_max_turns)
                .build(),
            ToolBundle::CodeSearch => builder
                .tool(SearchCodeTool::new(&self.settings))
                .default_max_turns(participant.default_max_turns)
                .build(),
            ToolBundle::FileRetrieval => builder
                .tool(GetFileContentsTool::new(&self.settings))
                .default_max_turns(participant.default_max_turns)
                .build(),
        }
    }
}

#[async_trait]
impl ChatDriver for RigChatDriver {
    async fn invoke(
        &self,
        participant: &Participant,
        message: &str,
        max_turns: Option<usize>,
    ) -> Result<ConversationResult, InvocationError> {
        let agent = self.build_agent(participant);
        let turns = max_turns.unwrap_or(participant.default_max_turns);

        let mut history: Vec<Message> = Vec::new();
        let reply = agent
            .prompt(message)
            .max_turns(turns)
            .with_history(&mut history)
            .await
            .map_err(|e| InvocationError::Completion(e.to_string()))?;

        Ok(transcript_from_history(participant.name, &history, &reply))
    }
}

/// Convert a rig message history into the core's transcript form.
///
/// Assistant text becomes participant replies; tool results keep their raw
/// text; tool-call-only messages carry no text and are skipped.
fn transcript_from_history(author: &str, history: &[Message], final_reply: &str) -> ConversationResult {
    let mut turns = Vec::new();

    for message in history {
        match message {
            Message::User { content, .. } => {
                for part in content.iter() {
                    match part {
                        UserContent::Text(text) => {
                            turns.push(Turn {
                                author: "user".into(),
                                text: text.text.clone(),
                                kind: TurnKind::Reply,
                            });
                        }
                        UserContent::ToolResult(result) => {
                            for piece in result.content.iter() {
                                if let ToolResultContent::Text(text) = piece {
                                    turns.push(Turn::tool_result(text.text.clone()));
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            Message::Assistant { content, .. } => {
                for part in content.iter() {
                    if let AssistantContent::Text(text) = part {
                        turns.push(Turn::reply(author, text.text.clone()));
                    }
                }
            }
        }
    }

    // Some providers return the final reply without appending it to the
    // history; make sure the transcript always ends with it.
    let already_recorded = turns
        .iter()
        .rev()
        .find(|t| t.kind == TurnKind::Reply && t.author == author)
        .is_some_and(|t| t.text == final_reply);
    if !already_recorded && !final_reply.trim().is_empty() {
        turns.push(Turn::reply(author, final_reply));
    }

    ConversationResult::from_turns(turns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_appends_missing_final_reply() {
        let history = vec![Message::user("Instruction: list pods")];
        let convo = transcript_from_history("Kubernetes_Assistant", &history, "##ANSWER## none");

        let replies = convo.replies_from("Kubernetes_Assistant");
        assert_eq!(replies, vec!["##ANSWER## none".to_string()]);
    }

    #[test]
    fn transcript_does_not_duplicate_recorded_reply() {
        let history = vec![
            Message::user("Instruction: list pods"),
            Message::assistant("##ANSWER## none"),
        ];
        let convo = transcript_from_history("Kubernetes_Assistant", &history, "##ANSWER## none");
        assert_eq!(convo.replies_from("Kubernetes_Assistant").len(), 1);
    }
}
