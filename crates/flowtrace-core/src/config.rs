//! Tracer configuration
//!
//! A [`TracerConfig`] value is built once per process (defaults, builder or
//! environment) and passed explicitly into every [`crate::ContactTracer`].

use crate::layout::LayoutConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default delay between two polls of a running query
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Default row field used to deduplicate search results
pub const DEFAULT_SEARCH_DEDUP_FIELD: &str = "ContactId";

/// How a running query is polled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollPolicy {
    /// Fixed delay between polls in milliseconds
    pub interval_ms: u64,

    /// Stop after this many polls; `None` polls until a terminal status
    pub max_polls: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_polls: None,
        }
    }
}

impl PollPolicy {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracerConfig {
    /// Log partitions searched for contact flow logs
    pub log_groups: Vec<String>,

    /// Polling behaviour of every submitted query
    pub poll: PollPolicy,

    /// Identity field for deduplicating search rows across branches
    pub search_dedup_field: Option<String>,

    /// Annotate comparison entries with their authored operands
    pub enrich: bool,

    /// Graph layout geometry
    pub layout: LayoutConfig,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            log_groups: Vec::new(),
            poll: PollPolicy::default(),
            search_dedup_field: Some(DEFAULT_SEARCH_DEDUP_FIELD.to_string()),
            enrich: true,
            layout: LayoutConfig::default(),
        }
    }
}

impl TracerConfig {
    /// Create a new config builder
    pub fn builder() -> TracerConfigBuilder {
        TracerConfigBuilder::new()
    }

    /// Create config from `FLOWTRACE_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable lookup.
    ///
    /// Unset or unparsable variables keep their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_lookup(lookup);
        config
    }

    /// Override fields from a variable lookup
    pub fn apply_lookup<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(groups) = lookup("FLOWTRACE_LOG_GROUPS") {
            self.log_groups = groups
                .split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(ms) = lookup("FLOWTRACE_POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.poll.interval_ms = ms;
        }
        if let Some(polls) = lookup("FLOWTRACE_MAX_POLLS").and_then(|v| v.parse().ok()) {
            self.poll.max_polls = Some(polls);
        }
        if let Some(field) = lookup("FLOWTRACE_SEARCH_DEDUP_FIELD") {
            self.search_dedup_field = if field.is_empty() { None } else { Some(field) };
        }
        if let Some(enrich) = lookup("FLOWTRACE_ENRICH").and_then(|v| v.parse().ok()) {
            self.enrich = enrich;
        }
        if let Some(columns) = lookup("FLOWTRACE_LAYOUT_COLUMNS").and_then(|v| v.parse().ok()) {
            self.layout.columns = columns;
        }
        if let Some(width) = lookup("FLOWTRACE_LAYOUT_NODE_WIDTH").and_then(|v| v.parse().ok()) {
            self.layout.node_width = width;
        }
        if let Some(height) = lookup("FLOWTRACE_LAYOUT_NODE_HEIGHT").and_then(|v| v.parse().ok()) {
            self.layout.node_height = height;
        }
    }
}

/// Builder for TracerConfig
pub struct TracerConfigBuilder {
    config: TracerConfig,
}

impl TracerConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self {
            config: TracerConfig::default(),
        }
    }

    /// Add a log partition to search
    pub fn log_group(mut self, group: impl Into<String>) -> Self {
        self.config.log_groups.push(group.into());
        self
    }

    /// Set the inter-poll delay in milliseconds
    pub fn poll_interval_ms(mut self, interval_ms: u64) -> Self {
        self.config.poll.interval_ms = interval_ms;
        self
    }

    /// Bound the number of polls per query
    pub fn max_polls(mut self, polls: u32) -> Self {
        self.config.poll.max_polls = Some(polls);
        self
    }

    /// Set (or clear) the search dedup field
    pub fn search_dedup_field(mut self, field: Option<String>) -> Self {
        self.config.search_dedup_field = field;
        self
    }

    /// Enable or disable comparison enrichment
    pub fn enrich(mut self, enabled: bool) -> Self {
        self.config.enrich = enabled;
        self
    }

    /// Set the layout geometry
    pub fn layout(mut self, layout: LayoutConfig) -> Self {
        self.config.layout = layout;
        self
    }

    /// Build the configuration
    pub fn build(self) -> TracerConfig {
        self.config
    }
}

impl Default for TracerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
