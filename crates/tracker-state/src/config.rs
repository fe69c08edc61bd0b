//! Tunables for [`crate::shared::SharedState`].

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a shared replica.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Combined cloud size at which the merge union moves to a blocking task.
    pub parallel_union_threshold: usize,
    /// Log every joined/left element, not just the counts.
    pub trace_diffs: bool,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            parallel_union_threshold: 256,
            trace_diffs: false,
        }
    }
}

impl StateConfig {
    pub fn builder() -> StateConfigBuilder {
        StateConfigBuilder::new()
    }

    /// Parse from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }
}

/// Builder for [`StateConfig`].
pub struct StateConfigBuilder {
    config: StateConfig,
}

impl StateConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: StateConfig::default(),
        }
    }

    pub fn parallel_union_threshold(mut self, dots: usize) -> Self {
        self.config.parallel_union_threshold = dots;
        self
    }

    pub fn trace_diffs(mut self, enabled: bool) -> Self {
        self.config.trace_diffs = enabled;
        self
    }

    pub fn build(self) -> StateConfig {
        self.config
    }
}

impl Default for StateConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
