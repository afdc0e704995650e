//! The source code analyzer: a linear validate-then-branch pipeline.
//!
//! Identify the repository from the user's request, search it for candidate
//! files, distill the search transcript into a [`CandidateFiles`] record,
//! then either summarize directly from a confident top pick or fetch up to
//! `max_files_to_retrieve` candidates' contents and decide from those. The
//! same fail-fast contract validation as the debugging loop applies at every
//! phase.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use crate::config::Settings;
use crate::contracts::{self, CandidateFiles, RepositoryInfo, WorkflowError};
use crate::conversation::{extract_user_input, ChatDriver, ConversationResult, InboundMessage};
use crate::event::EventSink;
use crate::participants::{AnalyzerRoster, Participant};
use crate::prompts;

/// Normalized outcome of one code-search conversation: the searcher's own
/// assessment plus the raw search results it saw.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchAssessment {
    #[serde(rename = "Assessment")]
    pub assessment: Option<String>,
    #[serde(rename = "Tool Call Results")]
    pub tool_results: Option<String>,
}

/// One fetched candidate file.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateContents {
    pub file: String,
    pub contents: String,
}

/// Mutable state of one analysis task.
#[derive(Debug, Default)]
pub struct AnalyzerContext {
    pub goal: String,
    pub repo: Option<RepositoryInfo>,
    pub search_output: Vec<SearchAssessment>,
}

/// The linear source-code analysis pipeline.
pub struct SourceCodeAnalyzer {
    driver: Arc<dyn ChatDriver>,
    eventer: Arc<dyn EventSink>,
    roster: AnalyzerRoster,
    max_files_to_retrieve: usize,
}

impl SourceCodeAnalyzer {
    pub fn new(
        driver: Arc<dyn ChatDriver>,
        eventer: Arc<dyn EventSink>,
        settings: &Settings,
    ) -> Self {
        Self {
            driver,
            eventer,
            roster: AnalyzerRoster::new(settings),
            max_files_to_retrieve: settings.max_files_to_retrieve,
        }
    }

    /// Run one task to completion, returning the report or the error text.
    pub async fn execute(&self, messages: &[InboundMessage]) -> String {
        match self.run(messages).await {
            Ok(report) => {
                self.eventer.emit(&report, true).await;
                report
            }
            Err(err) => {
                let message = err.to_string();
                self.eventer.emit(&message, true).await;
                message
            }
        }
    }

    async fn run(&self, messages: &[InboundMessage]) -> Result<String, WorkflowError> {
        let mut ctx = AnalyzerContext::default();
        ctx.goal = extract_user_input(messages)?;

        let repo = self.identify_repository(&ctx.goal).await?;
        self.eventer
            .emit(
                &format!(
                    "Investigating the following GitHub repository: {}",
                    json!(repo)
                ),
                false,
            )
            .await;
        ctx.repo = Some(repo.clone());

        let assessment = self.search_repository(&mut ctx, &repo).await?;
        let candidates = self.summarize_candidates(&ctx.goal, &assessment).await?;
        self.determine_best_file(&ctx.goal, &repo, candidates).await
    }

    async fn invoke(
        &self,
        description: &str,
        participant: &Participant,
        message: &str,
        max_turns: Option<usize>,
    ) -> Result<ConversationResult, WorkflowError> {
        self.driver
            .invoke(participant, message, max_turns)
            .await
            .map_err(|e| WorkflowError::new(format!("{description} failed: {e}")))
    }

    async fn identify_repository(&self, goal: &str) -> Result<RepositoryInfo, WorkflowError> {
        let convo = self
            .invoke(
                "Repository identification",
                &self.roster.repo_identifier,
                goal,
                Some(1),
            )
            .await?;
        contracts::parse_record(&convo)
            .map_err(|v| v.into_workflow_error("Repository identification"))
    }

    /// Search the repository for candidate files, keeping the searcher's last
    /// assessment and the last raw search result.
    async fn search_repository(
        &self,
        ctx: &mut AnalyzerContext,
        repo: &RepositoryInfo,
    ) -> Result<SearchAssessment, WorkflowError> {
        self.eventer
            .emit("Searching GitHub for relevant files...", false)
            .await;
        let message = prompts::code_search_message(&json!(repo).to_string(), &ctx.goal);
        let convo = self
            .invoke("Repository search", &self.roster.code_search, &message, Some(3))
            .await?;

        let assessment = SearchAssessment {
            assessment: convo.replies_from(self.roster.code_search.name).pop(),
            tool_results: convo.tool_outputs().pop(),
        };
        ctx.search_output.push(assessment.clone());
        Ok(assessment)
    }

    async fn summarize_candidates(
        &self,
        goal: &str,
        assessment: &SearchAssessment,
    ) -> Result<CandidateFiles, WorkflowError> {
        self.eventer.emit("Analyzing gathered files...", false).await;
        let message = format!("User Query: {goal}\n{}", json!(assessment));
        let convo = self
            .invoke(
                "File search summary",
                &self.roster.candidate_summarizer,
                &message,
                Some(1),
            )
            .await?;
        contracts::parse_record(&convo).map_err(|v| v.into_workflow_error("File search summary"))
    }

    /// Branch point: a confident top pick skips retrieval entirely; otherwise
    /// fetch candidate contents, bounded by `max_files_to_retrieve`.
    async fn determine_best_file(
        &self,
        goal: &str,
        repo: &RepositoryInfo,
        candidates: CandidateFiles,
    ) -> Result<String, WorkflowError> {
        if candidates.has_confident_top_pick() {
            self.eventer.emit("Identified most likely file", false).await;
            return self
                .summarize_results(goal, candidates.top_pick.trim())
                .await;
        }

        let contents = self.retrieve_candidate_contents(repo, &candidates).await?;
        self.summarize_results(goal, &json!(contents).to_string())
            .await
    }

    async fn retrieve_candidate_contents(
        &self,
        repo: &RepositoryInfo,
        candidates: &CandidateFiles,
    ) -> Result<Vec<CandidateContents>, WorkflowError> {
        let mut fetched = Vec::new();
        for file in candidates.candidates.iter().take(self.max_files_to_retrieve) {
            self.eventer
                .emit(&format!("Fetching file contents of candidate {file}"), false)
                .await;
            let message = prompts::file_retrieval_message(file, &json!(repo).to_string());
            let convo = self
                .invoke(
                    "Candidate file retrieval",
                    &self.roster.file_retrieval,
                    &message,
                    Some(3),
                )
                .await?;
            for contents in convo.tool_outputs() {
                fetched.push(CandidateContents {
                    file: file.clone(),
                    contents,
                });
            }
        }
        Ok(fetched)
    }

    async fn summarize_results(&self, goal: &str, file_info: &str) -> Result<String, WorkflowError> {
        self.eventer.emit("Generating a report.", false).await;
        let message = prompts::file_determination_message(goal, file_info);
        let convo = self
            .invoke(
                "Report generation",
                &self.roster.report_writer,
                &message,
                Some(1),
            )
            .await?;
        contracts::extract_text(&convo).map_err(|v| v.into_workflow_error("Report generation"))
    }
}
