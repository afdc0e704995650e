//! A2A messaging: resolve an agent's card and speak the JSON-RPC protocol.

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

/// Well-known path of the public agent card.
pub const AGENT_CARD_PATH: &str = "/.well-known/agent.json";

/// Card endpoint for an agent base URL.
pub fn card_endpoint(agent_url: &str) -> String {
    format!("{}{}", agent_url.trim_end_matches('/'), AGENT_CARD_PATH)
}

/// Build one A2A JSON-RPC request carrying a single text part.
pub fn build_send_request(method: &str, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": Uuid::new_v4().to_string(),
        "method": method,
        "params": {
            "message": {
                "role": "user",
                "parts": [{"kind": "text", "text": message}],
                "messageId": Uuid::new_v4().simple().to_string(),
            },
        },
    })
}

/// Pick the URL to send to, preferring the CRD's authoritative URL over the
/// card's self-reported one, and patch the card to match.
pub fn resolve_target_url(card: &mut Value, agent_url: &str, crd_url: Option<&str>) -> String {
    let card_url = card
        .get("url")
        .and_then(|v| v.as_str())
        .unwrap_or(agent_url)
        .to_string();

    if let Some(crd_url) = crd_url {
        if crd_url != card_url {
            info!(card_url = %card_url, crd_url = %crd_url, "overriding agent card URL from CRD");
            card["url"] = json!(crd_url);
            return crd_url.to_string();
        }
    }
    card_url
}

/// Extract the `data:` payloads from a server-sent-events body.
pub fn parse_sse_data(raw: &str) -> Vec<String> {
    raw.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|payload| payload.trim().to_string())
        .filter(|payload| !payload.is_empty())
        .collect()
}

/// HTTP client for A2A agents.
#[derive(Clone)]
pub struct A2aClient {
    http: reqwest::Client,
}

impl A2aClient {
    pub fn new() -> Result<Self> {
        // Agents frequently sit behind self-signed in-cluster certificates.
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("failed to build A2A HTTP client")?;
        Ok(Self { http })
    }

    /// Fetch the public agent card from the well-known endpoint.
    pub async fn fetch_agent_card(
        &self,
        agent_url: &str,
        auth_token: Option<&str>,
    ) -> Result<Value> {
        let mut request = self.http.get(card_endpoint(agent_url));
        if let Some(token) = auth_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("failed to fetch agent card from {agent_url}"))?;
        let status = response.status();
        if !status.is_success() {
            bail!("failed to fetch agent card from {agent_url}: HTTP {status}");
        }
        response
            .json()
            .await
            .with_context(|| format!("agent card from {agent_url} was not valid JSON"))
    }

    async fn post_rpc(
        &self,
        target_url: &str,
        request_body: &Value,
        auth_token: Option<&str>,
        streaming: bool,
    ) -> Result<reqwest::Response> {
        let mut request = self.http.post(target_url).json(request_body);
        if let Some(token) = auth_token {
            request = request.bearer_auth(token);
        }
        if streaming {
            request = request.header("Accept", "text/event-stream");
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("failed to send message to agent at {target_url}"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("agent at {target_url} returned HTTP {status}: {body}");
        }
        Ok(response)
    }

    /// Send one message and return the agent's JSON-RPC response.
    pub async fn send_message(
        &self,
        agent_url: &str,
        message: &str,
        auth_token: Option<&str>,
        crd_url: Option<&str>,
    ) -> Result<String> {
        let mut card = self.fetch_agent_card(agent_url, auth_token).await?;
        let target_url = resolve_target_url(&mut card, agent_url, crd_url);

        let request_body = build_send_request("message/send", message);
        let response = self
            .post_rpc(&target_url, &request_body, auth_token, false)
            .await?;
        let body: Value = response
            .json()
            .await
            .context("agent response was not valid JSON")?;

        Ok(format!(
            "Response from {agent_url}:\n\n{}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        ))
    }

    /// Send one message over the streaming endpoint and collect every chunk.
    pub async fn send_message_streaming(
        &self,
        agent_url: &str,
        message: &str,
        auth_token: Option<&str>,
        crd_url: Option<&str>,
    ) -> Result<String> {
        let mut card = self.fetch_agent_card(agent_url, auth_token).await?;
        let target_url = resolve_target_url(&mut card, agent_url, crd_url);

        let request_body = build_send_request("message/stream", message);
        let response = self
            .post_rpc(&target_url, &request_body, auth_token, true)
            .await?;
        let raw = response
            .text()
            .await
            .context("failed to read streaming response")?;

        let chunks: Vec<String> = parse_sse_data(&raw)
            .iter()
            .map(|payload| match serde_json::from_str::<Value>(payload) {
                Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_default(),
                Err(_) => payload.clone(),
            })
            .collect();

        Ok(format!(
            "Streaming response from {agent_url}:\n\n{}",
            chunks.join("\n\n")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_endpoint_handles_trailing_slash() {
        assert_eq!(
            card_endpoint("http://agent.svc:8000/"),
            "http://agent.svc:8000/.well-known/agent.json"
        );
        assert_eq!(
            card_endpoint("http://agent.svc:8000"),
            "http://agent.svc:8000/.well-known/agent.json"
        );
    }

    #[test]
    fn send_request_carries_one_text_part() {
        let request = build_send_request("message/send", "hello");
        assert_eq!(request["jsonrpc"], "2.0");
        assert_eq!(request["method"], "message/send");
        let parts = &request["params"]["message"]["parts"];
        assert_eq!(parts.as_array().unwrap().len(), 1);
        assert_eq!(parts[0]["kind"], "text");
        assert_eq!(parts[0]["text"], "hello");
        assert!(request["params"]["message"]["messageId"].is_string());
    }

    #[test]
    fn crd_url_overrides_card_url() {
        let mut card = json!({"name": "agent", "url": "http://localhost:8000/"});
        let target = resolve_target_url(
            &mut card,
            "http://agent.svc:8000/",
            Some("http://agent.agents.svc:8000/"),
        );
        assert_eq!(target, "http://agent.agents.svc:8000/");
        assert_eq!(card["url"], "http://agent.agents.svc:8000/");
    }

    #[test]
    fn matching_crd_url_keeps_card_url() {
        let mut card = json!({"url": "http://agent.svc:8000/"});
        let target =
            resolve_target_url(&mut card, "http://agent.svc:8000/", Some("http://agent.svc:8000/"));
        assert_eq!(target, "http://agent.svc:8000/");
    }

    #[test]
    fn missing_card_url_falls_back_to_agent_url() {
        let mut card = json!({"name": "agent"});
        let target = resolve_target_url(&mut card, "http://agent.svc:8000/", None);
        assert_eq!(target, "http://agent.svc:8000/");
    }

    #[test]
    fn sse_payloads_are_extracted_in_order() {
        let raw = "event: message\ndata: {\"a\": 1}\n\ndata: {\"b\": 2}\n\n: comment\ndata:\n";
        let payloads = parse_sse_data(raw);
        assert_eq!(payloads, vec!["{\"a\": 1}".to_string(), "{\"b\": 2}".to_string()]);
    }
}
