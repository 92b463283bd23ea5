use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Retry policy attached to HTTP primitive calls in the emitted program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_secs: u64,
    pub max_delay_secs: u64,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_secs: 1,
            max_delay_secs: 60,
            multiplier: 2.0,
        }
    }
}

/// Settings that shape the emitted program. Every field has a default, so a
/// partial JSON document is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Environment variable holding the backend API base URL at run time.
    pub base_url_env: String,
    /// Environment variable holding the engine's execution id.
    pub execution_id_env: String,
    /// Wait applied to prompts that do not set `timeoutSeconds`.
    pub response_timeout_secs: u64,
    /// Wait applied to webhook nodes that do not set `timeoutSeconds`.
    pub webhook_timeout_secs: u64,
    pub subflow_poll_interval_secs: u64,
    pub subflow_max_polls: u32,
    /// Iteration bound for loops that do not set `loopLimit`.
    pub default_loop_limit: u32,
    pub http_retry: RetryPolicy,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            base_url_env: "FLOW_API_BASE_URL".to_string(),
            execution_id_env: "GOOGLE_CLOUD_WORKFLOW_EXECUTION_ID".to_string(),
            response_timeout_secs: 86_400,
            webhook_timeout_secs: 3_600,
            subflow_poll_interval_secs: 5,
            subflow_max_polls: 720,
            default_loop_limit: 100,
            http_retry: RetryPolicy::default(),
        }
    }
}

impl CompilerConfig {
    /// Load a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }
}
