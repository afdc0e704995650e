//! MCP server bridging to A2A agents discovered via AgentCard resources.
//!
//! Five tools: three read-only discovery tools backed by the Kubernetes API
//! cache, and two messaging tools that speak the A2A JSON-RPC protocol to an
//! agent's resolved URL.

use anyhow::Result;
use clap::Parser;
use rmcp::{
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::Deserialize;
use tokio::io::{stdin, stdout};
use tracing::warn;

use a2a_bridge::a2a::A2aClient;
use a2a_bridge::discovery::{
    filter_agents, find_card_url, format_agent_table, summarize, AgentSummary, KubeApi,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "MCP bridge for A2A agent discovery and messaging")]
struct Args {
    /// Namespace used when a tool call names none.
    #[arg(long, default_value = "default")]
    default_namespace: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct DiscoverRequest {
    #[schemars(description = "Specific namespace to search")]
    namespace: Option<String>,
    #[schemars(description = "Search across all namespaces (default: false)")]
    #[serde(default)]
    all_namespaces: bool,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ListRequest {
    #[schemars(description = "Specific namespace to search")]
    namespace: Option<String>,
    #[schemars(description = "Search across all namespaces (default: false)")]
    #[serde(default)]
    all_namespaces: bool,
    #[schemars(
        description = "Case-insensitive substring to filter agents by skill, name, or description"
    )]
    filter: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct DetailsRequest {
    #[schemars(description = "Name of the AgentCard resource")]
    agentcard_name: String,
    #[schemars(description = "Namespace where the AgentCard exists")]
    namespace: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SendRequest {
    #[schemars(description = "Base URL of the agent (from the AgentCard status.card.url)")]
    agent_url: String,
    #[schemars(description = "The message text to send")]
    message: String,
    #[schemars(description = "Optional bearer token for authenticated requests")]
    auth_token: Option<String>,
}

/// The MCP server handler.
#[derive(Clone)]
struct BridgeServer {
    kube: KubeApi,
    a2a: A2aClient,
    default_namespace: String,
    tool_router: ToolRouter<Self>,
}

impl BridgeServer {
    fn new(kube: KubeApi, a2a: A2aClient, default_namespace: String) -> Self {
        Self {
            kube,
            a2a,
            default_namespace,
            tool_router: Self::tool_router(),
        }
    }

    async fn summaries(
        &self,
        namespace: Option<&str>,
        all_namespaces: bool,
    ) -> Result<Vec<AgentSummary>, String> {
        let namespace = namespace.or(Some(self.default_namespace.as_str()));
        let cards = self
            .kube
            .list_agent_cards(namespace, all_namespaces)
            .await
            .map_err(|e| e.to_string())?;
        Ok(cards.iter().map(summarize).collect())
    }

    /// Best-effort lookup of the CRD's authoritative URL for an agent.
    /// Failures degrade to the card URL rather than failing the send.
    async fn crd_url_for(&self, agent_url: &str) -> Option<String> {
        match self.kube.list_agent_cards(None, true).await {
            Ok(cards) => {
                let agents: Vec<AgentSummary> = cards.iter().map(summarize).collect();
                find_card_url(&agents, agent_url)
            }
            Err(e) => {
                warn!(error = %e, "CRD lookup failed; using the card URL as-is");
                None
            }
        }
    }
}

#[tool_router]
impl BridgeServer {
    #[tool(
        description = "Discover agents in the Kubernetes cluster using cached AgentCard resources. Returns immediately without calling agent endpoints; the operator keeps the cache up to date."
    )]
    async fn discover_agents(
        &self,
        Parameters(req): Parameters<DiscoverRequest>,
    ) -> Result<String, String> {
        let agents = self
            .summaries(req.namespace.as_deref(), req.all_namespaces)
            .await?;
        serde_json::to_string_pretty(&agents).map_err(|e| e.to_string())
    }

    #[tool(
        description = "Get a summary table of all discovered agents: name, namespace, version, protocol, sync status, and URL. Optionally filter by a case-insensitive substring over skill, name, or description."
    )]
    async fn list_agents(
        &self,
        Parameters(req): Parameters<ListRequest>,
    ) -> Result<String, String> {
        let mut agents = self
            .summaries(req.namespace.as_deref(), req.all_namespaces)
            .await?;
        if let Some(filter) = &req.filter {
            agents = filter_agents(agents, filter);
        }
        Ok(format_agent_table(&agents))
    }

    #[tool(
        description = "Get detailed information about a specific agent, including all skills, from its AgentCard resource."
    )]
    async fn get_agent_details(
        &self,
        Parameters(req): Parameters<DetailsRequest>,
    ) -> Result<String, String> {
        let card = self
            .kube
            .get_agent_card(&req.agentcard_name, &req.namespace)
            .await
            .map_err(|e| e.to_string())?;
        let detail = serde_json::json!({
            "resource": card.metadata.name,
            "namespace": card.metadata.namespace,
            "card": card.status.as_ref().and_then(|s| s.card.clone()),
            "synced": card.status.as_ref().and_then(|s| s.synced),
            "lastSynced": card.status.as_ref().and_then(|s| s.last_synced.clone()),
        });
        serde_json::to_string_pretty(&detail).map_err(|e| e.to_string())
    }

    #[tool(description = "Send a message to an A2A agent and return its response.")]
    async fn send_message_to_agent(
        &self,
        Parameters(req): Parameters<SendRequest>,
    ) -> Result<String, String> {
        let crd_url = self.crd_url_for(&req.agent_url).await;
        self.a2a
            .send_message(
                &req.agent_url,
                &req.message,
                req.auth_token.as_deref(),
                crd_url.as_deref(),
            )
            .await
            .map_err(|e| e.to_string())
    }

    #[tool(
        description = "Send a streaming message to an A2A agent and return all streamed chunks."
    )]
    async fn send_streaming_message_to_agent(
        &self,
        Parameters(req): Parameters<SendRequest>,
    ) -> Result<String, String> {
        let crd_url = self.crd_url_for(&req.agent_url).await;
        self.a2a
            .send_message_streaming(
                &req.agent_url,
                &req.message,
                req.auth_token.as_deref(),
                crd_url.as_deref(),
            )
            .await
            .map_err(|e| e.to_string())
    }
}

#[tool_handler]
impl ServerHandler for BridgeServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Bridge to A2A agents running in a Kubernetes cluster.\n\
                 - discover_agents / list_agents / get_agent_details: read the cached \
                   AgentCard resources; no agent endpoints are called.\n\
                 - send_message_to_agent / send_streaming_message_to_agent: resolve the \
                   agent's card and deliver a message over the A2A protocol."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let kube = KubeApi::from_env()?;
    let a2a = A2aClient::new()?;

    let server = BridgeServer::new(kube, a2a, args.default_namespace);
    let service = server.serve((stdin(), stdout())).await?;
    service.waiting().await?;

    Ok(())
}
