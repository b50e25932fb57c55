//! Tracker configuration

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};

/// Where deferred callables run when a tracker collects them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeferredDispatch {
    /// The blocking pool of the current tokio runtime, or a dedicated thread
    /// when no runtime is entered
    #[default]
    Auto,
    /// Always a dedicated thread
    Thread,
}

/// Configuration for a resource tracker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Name used in log output and errors
    pub name: String,
    /// Dispose of everything still tracked when the tracker is dropped
    pub collect_on_drop: bool,
    /// Execution strategy for deferred callables
    pub deferred_dispatch: DeferredDispatch,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            name: "tracker".to_string(),
            collect_on_drop: false,
            deferred_dispatch: DeferredDispatch::Auto,
        }
    }
}

impl TrackerConfig {
    pub fn builder() -> TrackerConfigBuilder {
        TrackerConfigBuilder::new()
    }

    /// Parse a configuration from JSON, filling missing fields with defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: TrackerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::configuration("tracker name must not be empty"));
        }
        Ok(())
    }
}

/// Builder for creating tracker configurations
pub struct TrackerConfigBuilder {
    config: TrackerConfig,
}

impl TrackerConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: TrackerConfig::default(),
        }
    }

    /// Set the tracker name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set whether dropping the tracker disposes its resources
    pub fn with_collect_on_drop(mut self, enabled: bool) -> Self {
        self.config.collect_on_drop = enabled;
        self
    }

    /// Set the deferred callable dispatch strategy
    pub fn with_deferred_dispatch(mut self, dispatch: DeferredDispatch) -> Self {
        self.config.deferred_dispatch = dispatch;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<TrackerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for TrackerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
