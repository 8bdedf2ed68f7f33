use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::AgentError;
use crate::model::ModelInvoker;

/// Model invoker that shells out to the `claude` CLI in print mode.
#[derive(Debug, Clone)]
pub struct ClaudeCli {
    model: String,
    timeout: Duration,
}

impl ClaudeCli {
    pub fn new(model: impl Into<String>, timeout: Duration) -> Result<Self, AgentError> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(AgentError::Model("no model configured".to_string()));
        }
        Ok(Self { model, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl ModelInvoker for ClaudeCli {
    fn model(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, system_prompt: &str, user_prompt: &str) -> Result<String, AgentError> {
        debug!(model = %self.model, prompt_len = user_prompt.len(), "Invoking claude CLI");

        let output = tokio::time::timeout(
            self.timeout,
            Command::new("claude")
                .args([
                    "-p",
                    user_prompt,
                    "--system-prompt",
                    system_prompt,
                    "--model",
                    &self.model,
                    "--output-format",
                    "text",
                ])
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| AgentError::Timeout(self.timeout.as_secs()))?
        .map_err(|e| AgentError::Model(format!("Failed to spawn claude: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, stderr = %stderr, "Claude CLI failed");
            return Err(AgentError::Model(format!(
                "claude exited {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if stdout.trim().is_empty() {
            return Err(AgentError::Model("claude returned an empty reply".to_string()));
        }
        Ok(stdout)
    }
}

/// Whether the `claude` CLI is installed and answers `--version`.
pub async fn check_cli_available() -> bool {
    match Command::new("claude").arg("--version").output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}
