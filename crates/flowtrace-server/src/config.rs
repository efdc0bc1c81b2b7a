//! Server configuration
//!
//! Loaded from an optional YAML or JSON file, then overridden by
//! `FLOWTRACE_*` environment variables.

use crate::client::DEFAULT_TIMEOUT_MS;
use flowtrace_core::TracerConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Server and gateway settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Base URL of the log query gateway
    pub log_query_url: String,

    /// Base URL of the flow definition gateway; enrichment is off without it
    pub flow_definition_url: Option<String>,

    /// Base URL of the trace gateway; trace analysis is off without it
    pub trace_url: Option<String>,

    /// Per-request timeout for gateway calls
    pub request_timeout_ms: u64,

    /// Engine settings
    pub tracer: TracerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_query_url: "http://localhost:9000".to_string(),
            flow_definition_url: None,
            trace_url: None,
            request_timeout_ms: DEFAULT_TIMEOUT_MS,
            tracer: TracerConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from `path` if given, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_lookup(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML (`.yaml`/`.yml`) or JSON file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let parsed = if is_yaml {
            serde_yaml::from_str(&content).map_err(|e| e.to_string())
        } else {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        };

        parsed.map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Override fields from a variable lookup
    pub fn apply_lookup<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("FLOWTRACE_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("FLOWTRACE_PORT").and_then(|v| v.parse().ok()) {
            self.port = port;
        }
        if let Some(url) = lookup("FLOWTRACE_LOG_QUERY_URL") {
            self.log_query_url = url;
        }
        if let Some(url) = lookup("FLOWTRACE_FLOW_DEFINITION_URL") {
            self.flow_definition_url = Some(url).filter(|u| !u.is_empty());
        }
        if let Some(url) = lookup("FLOWTRACE_TRACE_URL") {
            self.trace_url = Some(url).filter(|u| !u.is_empty());
        }
        if let Some(ms) = lookup("FLOWTRACE_REQUEST_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.request_timeout_ms = ms;
        }
        self.tracer.apply_lookup(&lookup);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_query_url.is_empty() {
            return Err(ConfigError::Invalid("log_query_url must be set".to_string()));
        }
        if self.tracer.layout.columns == 0 {
            return Err(ConfigError::Invalid("tracer.layout.columns must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("bind address {}:{}: {}", self.host, self.port, e)))
    }
}
