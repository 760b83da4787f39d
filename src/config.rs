//! Configuration for the mock server.
//!
//! Defines the listen address, logging settings, and the mappings
//! registered at start-up.

use crate::mapping::MockDescriptor;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Main configuration for the mock server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MockServerConfig {
    /// Address the HTTP listener binds to
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Mappings registered before the server accepts traffic
    #[serde(default)]
    pub mappings: Vec<MockDescriptor>,

    /// Global settings
    #[serde(default)]
    pub settings: GlobalSettings,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            mappings: Vec::new(),
            settings: GlobalSettings::default(),
        }
    }
}

impl MockServerConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&content)?;
        Ok(config)
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration by compiling every mapping.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (i, mapping) in self.mappings.iter().enumerate() {
            mapping
                .compile()
                .map_err(|e| anyhow::anyhow!("Mapping {}: {}", i, e))?;
        }
        Ok(())
    }
}

/// Global settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalSettings {
    /// Log all matched requests
    #[serde(default = "default_true")]
    pub log_matches: bool,

    /// Log unmatched requests
    #[serde(default = "default_true")]
    pub log_unmatched: bool,
}

fn default_true() -> bool {
    true
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            log_matches: true,
            log_unmatched: true,
        }
    }
}
