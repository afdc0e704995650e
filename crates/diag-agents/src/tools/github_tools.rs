//! GitHub REST tools for the source analyzer's search and retrieval roles.

use std::time::Duration;

use rig::completion::ToolDefinition;
use rig::tool::Tool;
use serde::Deserialize;
use serde_json::json;

use super::ToolError;
use crate::config::Settings;

const USER_AGENT: &str = concat!("diag-agents/", env!("CARGO_PKG_VERSION"));
const DEFAULT_RESULTS_PER_PAGE: u32 = 10;

fn http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .build()
}

fn bearer(request: reqwest::RequestBuilder, token: &Option<String>) -> reqwest::RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

async fn read_success(response: reqwest::Response) -> Result<String, ToolError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ToolError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.text().await?)
}

#[derive(Deserialize)]
pub struct SearchCodeInput {
    /// Full GitHub code-search query, including the repo:owner/name qualifier.
    pub query: String,
    /// Maximum results to return (default 10).
    pub per_page: Option<u32>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    path: String,
    repository: SearchRepository,
    #[serde(default)]
    html_url: Option<String>,
}

#[derive(Deserialize)]
struct SearchRepository {
    full_name: String,
}

/// Search file contents in a GitHub repository.
pub struct SearchCodeTool {
    api_base: String,
    token: Option<String>,
}

impl SearchCodeTool {
    pub fn new(settings: &Settings) -> Self {
        Self {
            api_base: settings.github_api_base.clone(),
            token: settings.github_token.clone(),
        }
    }
}

impl Tool for SearchCodeTool {
    const NAME: &'static str = "search_code";
    type Error = ToolError;
    type Args = SearchCodeInput;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: "search_code".into(),
            description: "Search file contents in a GitHub repository. The query must \
                          include a repo:owner/repository qualifier plus search terms. \
                          Returns matching file paths as JSON."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query, e.g. 'repo:acme/api retry backoff'"
                    },
                    "per_page": {
                        "type": "integer",
                        "description": "Maximum results to return (default 10)"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let client = http_client()?;
        let per_page = args.per_page.unwrap_or(DEFAULT_RESULTS_PER_PAGE).to_string();
        let request = client
            .get(format!("{}/search/code", self.api_base))
            .query(&[("q", args.query.as_str()), ("per_page", per_page.as_str())])
            .header("Accept", "application/vnd.github+json");
        let body = read_success(bearer(request, &self.token).send().await?).await?;

        let parsed: SearchResponse =
            serde_json::from_str(&body).unwrap_or(SearchResponse { items: Vec::new() });
        let matches: Vec<serde_json::Value> = parsed
            .items
            .iter()
            .map(|item| {
                json!({
                    "path": item.path,
                    "repository": item.repository.full_name,
                    "url": item.html_url,
                })
            })
            .collect();
        Ok(json!(matches).to_string())
    }
}

#[derive(Deserialize)]
pub struct GetFileContentsInput {
    /// Repository owner (user or organization).
    pub owner: String,
    /// Repository name.
    pub repository: String,
    /// Full path of the file within the repository.
    pub path: String,
    /// Branch to read from; omit for the default branch.
    pub branch: Option<String>,
}

/// Fetch one file's contents from a GitHub repository.
pub struct GetFileContentsTool {
    api_base: String,
    token: Option<String>,
}

impl GetFileContentsTool {
    pub fn new(settings: &Settings) -> Self {
        Self {
            api_base: settings.github_api_base.clone(),
            token: settings.github_token.clone(),
        }
    }
}

/// Contents-API URL for a file, optionally pinned to a branch.
fn contents_url(api_base: &str, owner: &str, repository: &str, path: &str) -> String {
    format!(
        "{}/repos/{}/{}/contents/{}",
        api_base,
        owner,
        repository,
        path.trim_start_matches('/')
    )
}

impl Tool for GetFileContentsTool {
    const NAME: &'static str = "get_file_contents";
    type Error = ToolError;
    type Args = GetFileContentsInput;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: "get_file_contents".into(),
            description: "Fetch the raw contents of one file from a GitHub repository."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "owner": {
                        "type": "string",
                        "description": "Repository owner (user or organization)"
                    },
                    "repository": {
                        "type": "string",
                        "description": "Repository name"
                    },
                    "path": {
                        "type": "string",
                        "description": "Full path of the file within the repository"
                    },
                    "branch": {
                        "type": "string",
                        "description": "Branch to read from (omit for the default branch)"
                    }
                },
                "required": ["owner", "repository", "path"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let client = http_client()?;
        let url = contents_url(&self.api_base, &args.owner, &args.repository, &args.path);
        let mut request = client
            .get(url)
            // The raw media type skips the base64 envelope entirely.
            .header("Accept", "application/vnd.github.raw+json");
        if let Some(branch) = &args.branch {
            request = request.query(&[("ref", branch.as_str())]);
        }
        read_success(bearer(request, &self.token).send().await?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contents_url_joins_path() {
        assert_eq!(
            contents_url("https://api.github.com", "acme", "api", "src/app.py"),
            "https://api.github.com/repos/acme/api/contents/src/app.py"
        );
    }

    #[test]
    fn contents_url_strips_leading_slash() {
        assert_eq!(
            contents_url("https://api.github.com", "acme", "api", "/src/app.py"),
            "https://api.github.com/repos/acme/api/contents/src/app.py"
        );
    }

    #[test]
    fn search_response_tolerates_missing_fields() {
        let parsed: SearchResponse = serde_json::from_str(
            r#"{"total_count": 1, "items": [{"path": "src/app.py", "repository": {"full_name": "acme/api"}}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(parsed.items[0].path, "src/app.py");
        assert!(parsed.items[0].html_url.is_none());
    }
}
