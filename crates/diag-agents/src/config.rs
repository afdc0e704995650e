use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Runtime settings for both agent pipelines.
///
/// `Default` reads the environment; a TOML file loaded via [`Settings::from_file`]
/// overrides individual fields on top of those defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// OpenAI-compatible completions endpoint.
    pub llm_api_base: String,
    pub llm_api_key: String,
    pub task_model_id: String,
    pub model_temperature: f64,
    /// Hard bound on plan-execute-reflect iterations.
    pub max_plan_steps: usize,
    /// Cap on candidate files fetched by the source analyzer.
    pub max_files_to_retrieve: usize,
    /// Tool-call round trips allowed per executor step.
    pub executor_max_turns: usize,
    pub github_api_base: String,
    pub github_token: Option<String>,
    pub kubectl_binary: String,
    pub kubeconfig: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            llm_api_base: env_or("LLM_API_BASE", "http://localhost:8000/v1"),
            llm_api_key: env_or("LLM_API_KEY", "not-needed"),
            task_model_id: env_or("TASK_MODEL_ID", "gpt-4o-mini"),
            model_temperature: env_parse("MODEL_TEMPERATURE", 0.2),
            max_plan_steps: env_parse("MAX_PLAN_STEPS", 6),
            max_files_to_retrieve: env_parse("MAX_FILES_TO_RETRIEVE", 3),
            executor_max_turns: env_parse("EXECUTOR_MAX_TURNS", 10),
            github_api_base: env_or("GITHUB_API_BASE", "https://api.github.com"),
            github_token: std::env::var("GITHUB_TOKEN").ok(),
            kubectl_binary: env_or("KUBECTL_BINARY", "kubectl"),
            kubeconfig: std::env::var("KUBECONFIG").ok(),
        }
    }
}

impl Settings {
    /// Load settings from the environment, with an optional TOML override file.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        match config_path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Parse a TOML settings file. Missing fields fall back to env defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse settings file {}", path.display()))
    }
}
