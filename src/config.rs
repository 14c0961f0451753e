//! Client configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Backend origin; API routes live under `{api_url}/api/v1`.
    pub api_url: String,
    /// Maximum number of registered models.
    pub model_cap: usize,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Log destination for the interactive UI.
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        Self {
            api_url: lookup("IFC_VIEWER_API_URL")
                .map(|url| url.trim().trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| DEFAULT_API_URL.into()),
            model_cap: lookup("IFC_VIEWER_MODEL_CAP")
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            request_timeout_secs: lookup("IFC_VIEWER_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            log_file: lookup("IFC_VIEWER_LOG")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }

    /// Base of all REST routes.
    #[must_use]
    pub fn api_base(&self) -> String {
        format!("{}/api/v1", self.api_url)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
