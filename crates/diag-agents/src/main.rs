use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use diag_agents::analyzer::SourceCodeAnalyzer;
use diag_agents::config::Settings;
use diag_agents::conversation::InboundMessage;
use diag_agents::debug_loop::KubernetesDebugAgent;
use diag_agents::event::LoggingSink;
use diag_agents::llm::RigChatDriver;
use diag_agents::server;

#[derive(Parser, Debug)]
#[command(author, version, about = "LLM-driven Kubernetes debugging and source analysis agents")]
struct Cli {
    /// Optional TOML settings file; fields not set fall back to env defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve both agents as MCP tools over stdio.
    Serve,
    /// Run one Kubernetes debugging task and print the report.
    Debug {
        /// The debugging request.
        goal: String,
    },
    /// Run one source-code analysis task and print the report.
    Analyze {
        /// The analysis request, naming the GitHub repository.
        goal: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    info!(
        llm_api_base = %settings.llm_api_base,
        model = %settings.task_model_id,
        "diagnostic agents starting"
    );

    match cli.command {
        Command::Serve => server::serve_stdio(settings).await,
        Command::Debug { goal } => {
            let driver = Arc::new(RigChatDriver::new(&settings)?);
            let agent = KubernetesDebugAgent::new(driver, Arc::new(LoggingSink), &settings);
            let report = agent.execute(&[InboundMessage::user(goal)]).await;
            println!("{report}");
            Ok(())
        }
        Command::Analyze { goal } => {
            let driver = Arc::new(RigChatDriver::new(&settings)?);
            let analyzer = SourceCodeAnalyzer::new(driver, Arc::new(LoggingSink), &settings);
            let report = analyzer.execute(&[InboundMessage::user(goal)]).await;
            println!("{report}");
            Ok(())
        }
    }
}
