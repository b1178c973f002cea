use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default API origin of the reference server.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Default collection path for feed items.
pub const DEFAULT_COLLECTION_PATH: &str = "/api/videos";

/// Connection settings for the feed API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Origin the collection path is resolved against.
    pub base_url: String,
    pub collection_path: String,
    /// Per-request timeout; zero disables it.
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            collection_path: DEFAULT_COLLECTION_PATH.to_string(),
            timeout_ms: 10_000,
            user_agent: format!("reel/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ApiConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
