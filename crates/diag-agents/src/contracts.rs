//! Structured response contracts and validation.
//!
//! Every control decision in the pipelines (plan steps, critic verdicts, goal
//! verdicts, next instructions, repository metadata, candidate files) is read
//! from a typed record parsed out of raw model text. Parsing is fail-closed:
//! a response that is not valid JSON, not an object, or does not match the
//! record's schema terminates the whole task with a [`WorkflowError`] naming
//! the failing phase. Nothing downstream ever runs on a record it cannot
//! trust.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::conversation::{ConversationResult, TurnKind};

/// Terminal failure of an agent task.
///
/// The message is user-visible content: it is emitted as the final event and
/// returned as the task result, so it names the failing phase and the reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct WorkflowError {
    message: String,
}

impl WorkflowError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Classified contract violation, before the phase name is attached.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractViolation {
    #[error("returned an empty conversation")]
    EmptyConversation,
    #[error("returned malformed content")]
    MalformedContent,
    #[error("returned empty text content")]
    EmptyText,
    #[error("returned invalid JSON")]
    InvalidJson,
    #[error("returned JSON that was not an object")]
    NotAnObject,
    #[error("returned an unexpected schema: {0}")]
    SchemaMismatch(String),
}

impl ContractViolation {
    /// Attach the failing phase, producing the terminal task error.
    pub fn into_workflow_error(self, phase: &str) -> WorkflowError {
        WorkflowError::new(format!("{phase} {self}."))
    }
}

/// Last textual reply of a conversation.
///
/// The final turn must be a non-empty text reply; a transcript that ends in a
/// raw tool result has no answer to read.
pub fn extract_text(convo: &ConversationResult) -> Result<String, ContractViolation> {
    let turn = convo
        .last_turn()
        .ok_or(ContractViolation::EmptyConversation)?;
    if turn.kind != TurnKind::Reply {
        return Err(ContractViolation::MalformedContent);
    }
    if turn.text.trim().is_empty() {
        return Err(ContractViolation::EmptyText);
    }
    Ok(turn.text.clone())
}

/// Last reply parsed as a JSON object.
pub fn extract_object(convo: &ConversationResult) -> Result<serde_json::Value, ContractViolation> {
    let text = extract_text(convo)?;
    let value: serde_json::Value =
        serde_json::from_str(text.trim()).map_err(|_| ContractViolation::InvalidJson)?;
    if !value.is_object() {
        return Err(ContractViolation::NotAnObject);
    }
    Ok(value)
}

/// Last reply validated against a typed record.
///
/// Any missing or mis-typed required field is a [`ContractViolation::SchemaMismatch`];
/// the field is never defaulted or coerced.
pub fn parse_record<T: DeserializeOwned>(
    convo: &ConversationResult,
) -> Result<T, ContractViolation> {
    let value = extract_object(convo)?;
    serde_json::from_value(value).map_err(|e| ContractViolation::SchemaMismatch(e.to_string()))
}

// ---------------------------------------------------------------------------
// Record types
// ---------------------------------------------------------------------------

/// Initial plan produced by the planner.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Plan {
    /// Coarse-grained step descriptions, in execution order.
    pub steps: Vec<String>,
}

/// Verdict shared by the step critic and the goal judge.
///
/// Two semantically different questions ("was this step done?" vs "is the
/// goal met?") deliberately share one wire schema; see DESIGN.md.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CriticDecision {
    /// True when the step (or goal) has been fully accomplished.
    pub decision: bool,
    /// Concise explanation of the decisive reason.
    pub explanation: String,
}

/// Next instruction chosen by the reflection planner.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StepInstruction {
    /// A concise instruction for the next step in the plan.
    #[serde(rename = "step_instruction")]
    pub instruction: String,
    /// Which requirement of the plan this step fulfills, and why.
    #[serde(rename = "requirement_to_fulfill")]
    pub rationale: String,
}

/// GitHub repository coordinates extracted from the user's request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RepositoryInfo {
    /// Exact owner (user or organization) name, as the user typed it.
    pub owner: String,
    /// Exact repository name.
    #[serde(rename = "repository_name")]
    pub name: String,
    /// Branch name; defaults to "main" when the request does not name one.
    #[serde(default = "default_branch")]
    pub branch: String,
}

fn default_branch() -> String {
    "main".into()
}

/// Values of `top_file_pick` that mean "no confident answer".
const NO_ANSWER_SENTINELS: &[&str] = &["", "none", "null", "n/a", "unknown", "not sure"];

/// Candidate source files distilled from a repository search transcript.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CandidateFiles {
    /// Full repo path of the one file that answers the query, if the search
    /// was certain. May carry a no-answer sentinel instead.
    #[serde(rename = "top_file_pick")]
    pub top_pick: String,
    /// Possible files in descending order of certainty, full repo paths.
    #[serde(rename = "candidate_files")]
    pub candidates: Vec<String>,
}

impl CandidateFiles {
    /// Whether `top_pick` names a real file rather than a no-answer sentinel.
    pub fn has_confident_top_pick(&self) -> bool {
        let pick = self.top_pick.trim();
        !NO_ANSWER_SENTINELS.contains(&pick.to_lowercase().as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Turn;

    fn reply(text: &str) -> ConversationResult {
        ConversationResult::from_turns(vec![
            Turn::reply("user", "question"),
            Turn::reply("Planner", text),
        ])
    }

    // -- extraction --

    #[test]
    fn extract_text_empty_conversation() {
        let convo = ConversationResult::default();
        assert_eq!(
            extract_text(&convo).unwrap_err(),
            ContractViolation::EmptyConversation
        );
    }

    #[test]
    fn extract_text_rejects_trailing_tool_result() {
        let convo = ConversationResult::from_turns(vec![
            Turn::reply("Planner", "working"),
            Turn::tool_result("raw output"),
        ]);
        assert_eq!(
            extract_text(&convo).unwrap_err(),
            ContractViolation::MalformedContent
        );
    }

    #[test]
    fn extract_text_rejects_blank_reply() {
        let convo = reply("   \n ");
        assert_eq!(extract_text(&convo).unwrap_err(), ContractViolation::EmptyText);
    }

    #[test]
    fn extract_object_rejects_non_json() {
        assert_eq!(
            extract_object(&reply("here is your plan")).unwrap_err(),
            ContractViolation::InvalidJson
        );
    }

    #[test]
    fn extract_object_rejects_array() {
        assert_eq!(
            extract_object(&reply("[1, 2, 3]")).unwrap_err(),
            ContractViolation::NotAnObject
        );
    }

    // -- typed records --

    #[test]
    fn parse_plan() {
        let plan: Plan = parse_record(&reply(r#"{"steps": ["list pods", "get logs"]}"#)).unwrap();
        assert_eq!(plan.steps, vec!["list pods", "get logs"]);
    }

    #[test]
    fn parse_plan_rejects_non_string_step() {
        let err = parse_record::<Plan>(&reply(r#"{"steps": ["list pods", 7]}"#)).unwrap_err();
        assert!(matches!(err, ContractViolation::SchemaMismatch(_)));
    }

    #[test]
    fn parse_critic_decision_rejects_string_boolean() {
        let err = parse_record::<CriticDecision>(&reply(
            r#"{"decision": "true", "explanation": "done"}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ContractViolation::SchemaMismatch(_)));
    }

    #[test]
    fn parse_critic_decision_requires_explanation() {
        let err = parse_record::<CriticDecision>(&reply(r#"{"decision": true}"#)).unwrap_err();
        assert!(matches!(err, ContractViolation::SchemaMismatch(_)));
    }

    #[test]
    fn parse_step_instruction_uses_wire_keys() {
        let step: StepInstruction = parse_record(&reply(
            r#"{"step_instruction": "check events", "requirement_to_fulfill": "gather evidence"}"#,
        ))
        .unwrap();
        assert_eq!(step.instruction, "check events");
        assert_eq!(step.rationale, "gather evidence");
    }

    #[test]
    fn parse_repository_info_defaults_branch_to_main() {
        let repo: RepositoryInfo =
            parse_record(&reply(r#"{"owner": "acme", "repository_name": "api"}"#)).unwrap();
        assert_eq!(repo.owner, "acme");
        assert_eq!(repo.name, "api");
        assert_eq!(repo.branch, "main");
    }

    #[test]
    fn parse_repository_info_rejects_null_owner() {
        let err = parse_record::<RepositoryInfo>(&reply(
            r#"{"owner": null, "repository_name": "api"}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ContractViolation::SchemaMismatch(_)));
    }

    // -- candidate files --

    #[test]
    fn confident_top_pick() {
        let files = CandidateFiles {
            top_pick: "src/app.py".into(),
            candidates: vec!["src/other.py".into()],
        };
        assert!(files.has_confident_top_pick());
    }

    #[test]
    fn sentinels_are_not_confident() {
        for sentinel in ["", "none", "NONE", "Null", "n/a", "N/A", "unknown", "Not Sure", "  n/a "]
        {
            let files = CandidateFiles {
                top_pick: sentinel.into(),
                candidates: vec![],
            };
            assert!(
                !files.has_confident_top_pick(),
                "sentinel {sentinel:?} treated as confident"
            );
        }
    }

    // -- error formatting --

    #[test]
    fn workflow_error_names_the_phase() {
        let err = ContractViolation::InvalidJson.into_workflow_error("Plan generation");
        assert_eq!(err.to_string(), "Plan generation returned invalid JSON.");
    }

    #[test]
    fn schema_mismatch_carries_detail() {
        let err = ContractViolation::SchemaMismatch("missing field `decision`".into())
            .into_workflow_error("Step evaluation");
        assert!(err.to_string().starts_with("Step evaluation returned an unexpected schema"));
        assert!(err.to_string().contains("decision"));
    }
}
