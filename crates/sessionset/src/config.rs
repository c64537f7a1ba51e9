//! Configuration for the session registry.

use std::time::Duration;

use crate::error::{Error, Result};

/// Default idle time before a session is evicted (one hour).
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Default interval between background sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for the session registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Idle duration after which a session becomes eligible for eviction.
    /// Applied uniformly to every session regardless of partition.
    pub ttl: Duration,

    /// Whether [`Sweeper`](crate::Sweeper) should be started by embedders.
    /// If false, expired sessions are only dropped by explicit prune calls.
    pub enable_sweeper: bool,

    /// Interval between background sweeps.
    pub sweep_interval: Duration,

    /// Run a full rebuild instead of the lazy sweep on every Nth tick.
    pub full_rebuild_every: Option<u32>,

    /// Keep a client-supplied token that the registry doesn't know about as
    /// the new session's token. When false a fresh token is minted instead.
    pub adopt_unknown_tokens: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            enable_sweeper: true,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            full_rebuild_every: None,
            adopt_unknown_tokens: true,
        }
    }
}

impl RegistryConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the session TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Enable or disable the background sweeper.
    pub fn with_sweeper(mut self, enabled: bool) -> Self {
        self.enable_sweeper = enabled;
        self
    }

    /// Set the sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Run a full rebuild on every `n`th sweep. `0` disables it.
    pub fn with_full_rebuild_every(mut self, n: u32) -> Self {
        self.full_rebuild_every = (n > 0).then_some(n);
        self
    }

    /// Control whether unknown client tokens are adopted or replaced.
    pub fn with_adopt_unknown_tokens(mut self, adopt: bool) -> Self {
        self.adopt_unknown_tokens = adopt;
        self
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.ttl.is_zero() {
            return Err(Error::InvalidConfig("ttl must be greater than zero".into()));
        }
        if self.sweep_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "sweep_interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(3600));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert!(config.enable_sweeper);
        assert!(config.adopt_unknown_tokens);
        assert!(config.full_rebuild_every.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = RegistryConfig::new()
            .with_ttl(Duration::from_secs(5))
            .with_sweep_interval(Duration::from_secs(1))
            .with_full_rebuild_every(10)
            .with_adopt_unknown_tokens(false);

        assert_eq!(config.ttl, Duration::from_secs(5));
        assert_eq!(config.sweep_interval, Duration::from_secs(1));
        assert_eq!(config.full_rebuild_every, Some(10));
        assert!(!config.adopt_unknown_tokens);

        let config = config.with_full_rebuild_every(0);
        assert!(config.full_rebuild_every.is_none());
    }

    #[test]
    fn test_validate_rejects_zero_ttl() {
        let config = RegistryConfig::new().with_ttl(Duration::ZERO);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_zero_interval_even_when_sweeper_disabled() {
        let config = RegistryConfig::new().with_sweep_interval(Duration::ZERO);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = config.with_sweeper(false);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }
}
