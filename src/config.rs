//! stackgraph.toml: stack, network, studio, and endpoint settings.

use serde::{Deserialize, Serialize};
use stackgraph_blueprints::{EndpointParams, NetworkParams, StackParams, StudioParams};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    pub stack: StackParams,
    pub network: NetworkParams,
    pub studio: StudioParams,
    pub endpoint: EndpointParams,
}

impl StackConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Parse config text, surfacing errors instead of falling back.
    pub fn from_toml(content: &str) -> stackgraph_core::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Render the effective config as TOML.
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// `~/.config/stackgraph/stackgraph.toml` (platform config dir).
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stackgraph")
            .join("stackgraph.toml")
    }
}

/// Where `apply` keeps journals and reports when no path is given.
pub fn runs_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stackgraph")
        .join("runs")
}
