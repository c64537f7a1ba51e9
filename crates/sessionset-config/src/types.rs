//! Configuration file types.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sessionset::RegistryConfig;

use crate::Result;

/// Root of a sessionset config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSetConfig {
    /// Session registry settings.
    pub session: SessionSection,
}

impl SessionSetConfig {
    /// Create an empty configuration (every setting at its default).
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from TOML.
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Serialize the configuration to TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another layer on top of this one. Values set in `other` win.
    pub fn merge(&mut self, other: SessionSetConfig) {
        self.session.merge(other.session);
    }

    /// Build a validated registry configuration.
    pub fn registry_config(&self) -> Result<RegistryConfig> {
        let config = self.session.to_registry_config();
        config.validate()?;
        Ok(config)
    }
}

/// Session registry configuration.
///
/// Every field is optional so that layers only override what they set.
///
/// ```toml
/// [session]
/// ttl_secs = 3600
/// sweep_interval_secs = 60
/// enable_sweeper = true
/// full_rebuild_every = 60
/// adopt_unknown_tokens = true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionSection {
    /// Idle seconds before a session expires (default: 3600).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
    /// Seconds between background sweeps (default: 60).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sweep_interval_secs: Option<u64>,
    /// Whether to run the background sweeper (default: true).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_sweeper: Option<bool>,
    /// Run a full rebuild every N sweeps; 0 disables (default: disabled).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_rebuild_every: Option<u32>,
    /// Keep unknown client tokens for new sessions (default: true).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adopt_unknown_tokens: Option<bool>,
}

impl SessionSection {
    fn merge(&mut self, other: SessionSection) {
        if other.ttl_secs.is_some() {
            self.ttl_secs = other.ttl_secs;
        }
        if other.sweep_interval_secs.is_some() {
            self.sweep_interval_secs = other.sweep_interval_secs;
        }
        if other.enable_sweeper.is_some() {
            self.enable_sweeper = other.enable_sweeper;
        }
        if other.full_rebuild_every.is_some() {
            self.full_rebuild_every = other.full_rebuild_every;
        }
        if other.adopt_unknown_tokens.is_some() {
            self.adopt_unknown_tokens = other.adopt_unknown_tokens;
        }
    }

    fn to_registry_config(&self) -> RegistryConfig {
        let mut config = RegistryConfig::default();
        if let Some(secs) = self.ttl_secs {
            config = config.with_ttl(Duration::from_secs(secs));
        }
        if let Some(secs) = self.sweep_interval_secs {
            config = config.with_sweep_interval(Duration::from_secs(secs));
        }
        if let Some(enabled) = self.enable_sweeper {
            config = config.with_sweeper(enabled);
        }
        if let Some(n) = self.full_rebuild_every {
            config = config.with_full_rebuild_every(n);
        }
        if let Some(adopt) = self.adopt_unknown_tokens {
            config = config.with_adopt_unknown_tokens(adopt);
        }
        config
    }
}
