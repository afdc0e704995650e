//! Participant rosters: fixed sets of model-backed roles, built once per task.
//!
//! A participant binds a role name to a system preamble, a sampling
//! temperature, an optional tool bundle, and a default turn budget. Roles
//! that must produce structured output get the JSON schema of their contract
//! embedded in the preamble, the same way the reference deployment pinned a
//! `response_format` per role.

use schemars::JsonSchema;

use crate::config::Settings;
use crate::contracts::{CandidateFiles, CriticDecision, Plan, RepositoryInfo, StepInstruction};
use crate::prompts;

/// Conversational roles across both pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Planner,
    Executor,
    StepCritic,
    GoalJudge,
    Reflection,
    ReportWriter,
    RepoIdentifier,
    CodeSearch,
    CandidateSummarizer,
    FileRetrieval,
}

/// Capability set attached to a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolBundle {
    None,
    /// Read-only kubectl access to the target cluster.
    Kubernetes,
    /// GitHub code search.
    CodeSearch,
    /// GitHub file-content retrieval.
    FileRetrieval,
}

impl ToolBundle {
    /// Human-readable tool descriptions, for embedding in planner prompts.
    pub fn descriptions(&self) -> &'static str {
        match self {
            Self::None => "[]",
            Self::Kubernetes => {
                "[{\"kubectl\": \"run read-only kubectl subcommands (get, describe, logs, \
                 events, top, explain, api-resources) against the cluster\"}]"
            }
            Self::CodeSearch => {
                "[{\"search_code\": \"search file contents in a GitHub repository\"}]"
            }
            Self::FileRetrieval => {
                "[{\"get_file_contents\": \"fetch one file's contents from a GitHub repository\"}]"
            }
        }
    }
}

/// A model-backed conversational role with a fixed prompt and optional tools.
#[derive(Debug, Clone)]
pub struct Participant {
    pub role: Role,
    pub name: &'static str,
    pub preamble: String,
    pub temperature: f64,
    pub tools: ToolBundle,
    pub default_max_turns: usize,
}

impl Participant {
    fn new(role: Role, name: &'static str, preamble: impl Into<String>, temperature: f64) -> Self {
        Self {
            role,
            name,
            preamble: preamble.into(),
            temperature,
            tools: ToolBundle::None,
            default_max_turns: 1,
        }
    }

    fn with_tools(mut self, tools: ToolBundle, max_turns: usize) -> Self {
        self.tools = tools;
        self.default_max_turns = max_turns;
        self
    }

    /// Embed the JSON schema of the expected response record in the preamble.
    fn with_response_schema<T: JsonSchema>(mut self) -> Self {
        let schema = schemars::schema_for!(T);
        let rendered = serde_json::to_string_pretty(&schema).unwrap_or_default();
        self.preamble.push_str(
            "\n\nRespond with a single JSON object conforming to this JSON schema. \
             Output only the JSON object — no prose, no code fences.\n",
        );
        self.preamble.push_str(&rendered);
        self
    }
}

/// Roster for the Kubernetes debugging loop. Built fresh for every task.
#[derive(Debug, Clone)]
pub struct DebugRoster {
    pub planner: Participant,
    pub executor: Participant,
    pub step_critic: Participant,
    pub goal_judge: Participant,
    pub reflection: Participant,
    pub report_writer: Participant,
}

impl DebugRoster {
    pub fn new(settings: &Settings) -> Self {
        let temp = settings.model_temperature;
        Self {
            planner: Participant::new(
                Role::Planner,
                "Planner",
                prompts::planner_preamble(ToolBundle::Kubernetes.descriptions()),
                temp,
            )
            .with_response_schema::<Plan>(),
            executor: Participant::new(
                Role::Executor,
                "Kubernetes_Assistant",
                prompts::ASSISTANT_PREAMBLE,
                temp,
            )
            .with_tools(ToolBundle::Kubernetes, settings.executor_max_turns),
            step_critic: Participant::new(Role::StepCritic, "Step_Critic", "", temp)
                .with_response_schema::<CriticDecision>(),
            goal_judge: Participant::new(
                Role::GoalJudge,
                "GoalJudge",
                prompts::GOAL_JUDGE_PREAMBLE,
                temp,
            )
            .with_response_schema::<CriticDecision>(),
            reflection: Participant::new(
                Role::Reflection,
                "ReflectionAssistant",
                prompts::REFLECTION_PREAMBLE,
                temp,
            )
            .with_response_schema::<StepInstruction>(),
            report_writer: Participant::new(
                Role::ReportWriter,
                "Report_Generator",
                prompts::REPORT_WRITER_PREAMBLE,
                temp,
            ),
        }
    }
}

/// Roster for the source-code analysis pipeline. Built fresh for every task.
#[derive(Debug, Clone)]
pub struct AnalyzerRoster {
    pub repo_identifier: Participant,
    pub code_search: Participant,
    pub candidate_summarizer: Participant,
    pub file_retrieval: Participant,
    pub report_writer: Participant,
}

impl AnalyzerRoster {
    pub fn new(settings: &Settings) -> Self {
        let temp = settings.model_temperature;
        Self {
            repo_identifier: Participant::new(
                Role::RepoIdentifier,
                "Repo_ID_Assistant",
                prompts::REPO_IDENTIFIER_PREAMBLE,
                temp,
            )
            .with_response_schema::<RepositoryInfo>(),
            code_search: Participant::new(
                Role::CodeSearch,
                "Git_Code_Search_Assistant",
                prompts::ASSISTANT_PREAMBLE,
                temp,
            )
            .with_tools(ToolBundle::CodeSearch, 3),
            candidate_summarizer: Participant::new(
                Role::CandidateSummarizer,
                "File_Search_Summarizer",
                prompts::SEARCH_SUMMARIZER_PREAMBLE,
                temp,
            )
            .with_response_schema::<CandidateFiles>(),
            file_retrieval: Participant::new(
                Role::FileRetrieval,
                "File_Retrieval_Assistant",
                prompts::ASSISTANT_PREAMBLE,
                temp,
            )
            .with_tools(ToolBundle::FileRetrieval, 3),
            report_writer: Participant::new(
                Role::ReportWriter,
                "Report_Generator_Assistant",
                "",
                temp,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_roster_wires_tools_and_schemas() {
        let roster = DebugRoster::new(&Settings::default());

        assert_eq!(roster.executor.tools, ToolBundle::Kubernetes);
        assert!(roster.executor.default_max_turns > 1);
        assert_eq!(roster.planner.tools, ToolBundle::None);

        // Structured roles carry their contract schema in the preamble.
        assert!(roster.planner.preamble.contains("\"steps\""));
        assert!(roster.step_critic.preamble.contains("\"decision\""));
        assert!(roster.reflection.preamble.contains("step_instruction"));
        // Free-form roles do not.
        assert!(!roster.report_writer.preamble.contains("JSON schema"));
    }

    #[test]
    fn analyzer_roster_bounds_tool_turns() {
        let roster = AnalyzerRoster::new(&Settings::default());

        assert_eq!(roster.code_search.default_max_turns, 3);
        assert_eq!(roster.file_retrieval.default_max_turns, 3);
        assert!(roster.repo_identifier.preamble.contains("repository_name"));
        assert!(roster.candidate_summarizer.preamble.contains("top_file_pick"));
    }

    #[test]
    fn planner_preamble_names_executor_tools() {
        let roster = DebugRoster::new(&Settings::default());
        assert!(roster.planner.preamble.contains("kubectl"));
    }
}
