//! Read-only kubectl access for the executor participant.

use std::time::Duration;

use rig::completion::ToolDefinition;
use rig::tool::Tool;
use serde::Deserialize;

use super::ToolError;
use crate::config::Settings;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Subcommands the tool will run. Everything that mutates cluster state is
/// rejected before a process is spawned.
const ALLOWED_SUBCOMMANDS: &[&str] = &[
    "get",
    "describe",
    "logs",
    "events",
    "top",
    "explain",
    "api-resources",
    "version",
];

/// Flags that would redirect the call outside the configured cluster/identity.
const FORBIDDEN_FLAGS: &[&str] = &["--kubeconfig", "--token", "--server", "--as"];

#[derive(Deserialize)]
pub struct KubectlInput {
    /// The kubectl subcommand to run, e.g. "get" or "logs".
    pub subcommand: String,
    /// Arguments after the subcommand, e.g. ["pods", "-o", "wide"].
    #[serde(default)]
    pub args: Vec<String>,
    /// Namespace to scope the call to.
    pub namespace: Option<String>,
    /// Query all namespaces instead of one.
    #[serde(default)]
    pub all_namespaces: bool,
}

/// Run read-only kubectl subcommands against the target cluster.
pub struct KubectlTool {
    binary: String,
    kubeconfig: Option<String>,
}

impl KubectlTool {
    pub fn new(settings: &Settings) -> Self {
        Self {
            binary: settings.kubectl_binary.clone(),
            kubeconfig: settings.kubeconfig.clone(),
        }
    }
}

/// Validate the request and produce the full kubectl argument vector.
fn build_args(input: &KubectlInput) -> Result<Vec<String>, ToolError> {
    let subcommand = input.subcommand.trim();
    if !ALLOWED_SUBCOMMANDS.contains(&subcommand) {
        return Err(ToolError::SubcommandNotAllowed {
            subcommand: subcommand.to_string(),
        });
    }

    for arg in &input.args {
        if FORBIDDEN_FLAGS
            .iter()
            .any(|f| arg == f || arg.starts_with(&format!("{f}=")))
        {
            return Err(ToolError::ArgumentNotAllowed {
                argument: arg.clone(),
            });
        }
    }

    let mut args = vec![subcommand.to_string()];
    args.extend(input.args.iter().cloned());
    if input.all_namespaces {
        args.push("--all-namespaces".into());
    } else if let Some(namespace) = &input.namespace {
        args.push("--namespace".into());
        args.push(namespace.clone());
    }
    Ok(args)
}

impl Tool for KubectlTool {
    const NAME: &'static str = "kubectl";
    type Error = ToolError;
    type Args = KubectlInput;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: "kubectl".into(),
            description: "Run a read-only kubectl subcommand (get, describe, logs, events, \
                          top, explain, api-resources, version) against the cluster and \
                          return its output."
                .into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "subcommand": {
                        "type": "string",
                        "description": "The kubectl subcommand, e.g. 'get' or 'logs'"
                    },
                    "args": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Arguments after the subcommand, e.g. ['pods', '-o', 'wide']"
                    },
                    "namespace": {
                        "type": "string",
                        "description": "Namespace to scope the call to"
                    },
                    "all_namespaces": {
                        "type": "boolean",
                        "description": "Query all namespaces instead of one"
                    }
                },
                "required": ["subcommand"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let argv = build_args(&args)?;
        let binary = self.binary.clone();
        let kubeconfig = self.kubeconfig.clone();

        let handle = tokio::task::spawn_blocking(move || {
            let mut cmd = std::process::Command::new(&binary);
            cmd.args(&argv);
            if let Some(kubeconfig) = &kubeconfig {
                cmd.env("KUBECONFIG", kubeconfig);
            }
            cmd.output()
        });

        let output = match tokio::time::timeout(
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            handle,
        )
        .await
        {
            Ok(Ok(result)) => result?,
            Ok(Err(join_err)) => {
                return Err(ToolError::Io(std::io::Error::other(join_err.to_string())))
            }
            Err(_) => {
                return Err(ToolError::Timeout {
                    seconds: DEFAULT_TIMEOUT_SECS,
                })
            }
        };

        if !output.status.success() {
            return Err(ToolError::CommandFailed {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
