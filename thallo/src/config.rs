//! Client configuration loaded from JSON and the environment.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{Error, Result};

/// Environment variable overriding [`ClientConfig::base_url`].
pub const API_URL_ENV: &str = "THALLO_API_URL";

/// Settings shared by the HTTP backend and the live session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    /// Delay between two job status requests.
    pub poll_interval_ms: u64,
    /// Quiet window after the last lever edit before recomputing.
    pub debounce_ms: u64,
    pub request_timeout_ms: u64,
    /// Optional cap on the number of parcel points.
    pub max_points: Option<usize>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            poll_interval_ms: 2000,
            debounce_ms: 400,
            request_timeout_ms: 20_000,
            max_points: None,
        }
    }
}

impl ClientConfig {
    /// Reads a configuration file; missing keys fall back to defaults.
    pub fn from_json_file(path: &str) -> Result<Self> {
        let contents = crate::io::read_to_string(path)
            .map_err(|e| Error::Config(format!("{path}: {e}")))?;
        let config: ClientConfig = serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("{path}: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `THALLO_API_URL` when it is set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.base_url = url;
            }
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "base_url must be an http(s) URL, got {}",
                self.base_url
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
