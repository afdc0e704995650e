//! MCP server exposing both diagnostic agents as tools over stdio.
//!
//! Each tool call builds a fresh driver, roster, and context — concurrent
//! tasks share no mutable state. Progress updates stream through a
//! [`ChannelSink`] and are forwarded to the log; the tool result is the
//! task's final text (report or error description), with no separate
//! success/failure status at this boundary.

use std::sync::Arc;

use anyhow::Result;
use rmcp::{
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::Deserialize;
use tokio::io::{stdin, stdout};
use tracing::info;

use crate::analyzer::SourceCodeAnalyzer;
use crate::config::Settings;
use crate::conversation::InboundMessage;
use crate::debug_loop::KubernetesDebugAgent;
use crate::event::{ChannelSink, EventSink};
use crate::llm::RigChatDriver;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DebugRequest {
    #[schemars(
        description = "The debugging request, e.g. 'Why is the payments-api deployment stuck in CrashLoopBackOff?'"
    )]
    pub query: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AnalyzeRequest {
    #[schemars(
        description = "A log excerpt, stack trace, or question, naming the GitHub repository to search (owner/name and optionally a branch)"
    )]
    pub query: String,
}

/// The MCP server handler for both diagnostic agents.
#[derive(Clone)]
pub struct DiagAgentServer {
    settings: Settings,
    tool_router: ToolRouter<Self>,
}

impl DiagAgentServer {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            tool_router: Self::tool_router(),
        }
    }

    /// Build a channel sink whose updates are forwarded to the log while the
    /// task runs.
    fn progress_sink(&self) -> Arc<dyn EventSink> {
        let (sink, mut rx) = ChannelSink::new();
        tokio::spawn(async move {
            while let Some(update) = rx.recv().await {
                info!(is_final = update.is_final, "{}", update.message);
            }
        });
        Arc::new(sink)
    }
}

#[tool_router]
impl DiagAgentServer {
    #[tool(
        description = "Investigate Kubernetes workloads, events, and logs to explain failures and suggest remediation. Runs a bounded plan-execute-reflect loop with read-only cluster access."
    )]
    async fn debug_kubernetes(
        &self,
        Parameters(req): Parameters<DebugRequest>,
    ) -> Result<String, String> {
        let driver = RigChatDriver::new(&self.settings).map_err(|e| e.to_string())?;
        let agent =
            KubernetesDebugAgent::new(Arc::new(driver), self.progress_sink(), &self.settings);
        Ok(agent.execute(&[InboundMessage::user(req.query)]).await)
    }

    #[tool(
        description = "Map log or error output to the most likely source file in a GitHub repository, summarizing the evidence for the pick."
    )]
    async fn analyze_source_code(
        &self,
        Parameters(req): Parameters<AnalyzeRequest>,
    ) -> Result<String, String> {
        let driver = RigChatDriver::new(&self.settings).map_err(|e| e.to_string())?;
        let analyzer =
            SourceCodeAnalyzer::new(Arc::new(driver), self.progress_sink(), &self.settings);
        Ok(analyzer.execute(&[InboundMessage::user(req.query)]).await)
    }
}

#[tool_handler]
impl ServerHandler for DiagAgentServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Diagnostic agents for cluster operations.\n\
                 - debug_kubernetes: investigate Kubernetes workloads, events, and logs to \
                   explain failures.\n\
                 - analyze_source_code: connect log or error output to the most likely \
                   source file in a GitHub repository."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// Serve both agents over stdio until the client disconnects.
pub async fn serve_stdio(settings: Settings) -> Result<()> {
    let service = DiagAgentServer::new(settings).serve((stdin(), stdout())).await?;
    service.waiting().await?;
    Ok(())
}
