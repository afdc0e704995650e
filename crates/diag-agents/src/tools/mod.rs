//! Rig-compatible tools attached to tool-capable participants.
//!
//! Each tool implements `rig::tool::Tool` and is registered on an agent via
//! `AgentBuilder::tool()`. The kubectl tool is restricted to read-only
//! subcommands; the GitHub tools are plain REST calls.

pub mod github_tools;
pub mod kubectl_tool;

/// Errors that can occur during tool execution.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("subcommand `{subcommand}` not in read-only allowlist")]
    SubcommandNotAllowed { subcommand: String },

    #[error("argument `{argument}` is not permitted")]
    ArgumentNotAllowed { argument: String },

    #[error("command timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("command failed (exit {code}): {stderr}")]
    CommandFailed { code: i32, stderr: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },
}
