//! Debugger configuration
//!
//! Configuration is read from YAML. Every field has a default, so an empty
//! document is a valid configuration:
//!
//! ```yaml
//! debounce_ms: 10
//! trace_signals: false
//! tree_above: 50
//! tree_below: 50
//! max_outputs_per_session: 10000
//! auto_focus: true
//! ```

use neodap_graph::{EdgeType, StoreConfig, TreeWindowOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebuggerConfig {
    /// Debounce window of tree rebuilds, in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Trace every index and position signal change
    #[serde(default)]
    pub trace_signals: bool,

    #[serde(default = "default_tree_span")]
    pub tree_above: usize,

    #[serde(default = "default_tree_span")]
    pub tree_below: usize,

    /// Oldest outputs are dropped once a session holds this many
    #[serde(default = "default_max_outputs")]
    pub max_outputs_per_session: usize,

    /// Pin the root context to the top frame of every fetched stack
    #[serde(default = "default_true")]
    pub auto_focus: bool,
}

fn default_debounce_ms() -> u64 {
    10
}

fn default_tree_span() -> usize {
    50
}

fn default_max_outputs() -> usize {
    10_000
}

fn default_true() -> bool {
    true
}

impl Default for DebuggerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            trace_signals: false,
            tree_above: default_tree_span(),
            tree_below: default_tree_span(),
            max_outputs_per_session: default_max_outputs(),
            auto_focus: true,
        }
    }
}

impl DebuggerConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: DebuggerConfig = if yaml.trim().is_empty() {
            DebuggerConfig::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_outputs_per_session == 0 {
            return Err(ConfigError::Invalid {
                field: "max_outputs_per_session",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Store settings derived from this configuration
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            debounce: self.debounce(),
            trace_signals: self.trace_signals,
        }
    }

    /// Tree window shape over `edges` using the configured spans
    pub fn tree_options(&self, edges: impl IntoIterator<Item = EdgeType>) -> TreeWindowOptions {
        TreeWindowOptions::new(edges)
            .above(self.tree_above)
            .below(self.tree_below)
    }
}
