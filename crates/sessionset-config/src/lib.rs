//! Configuration for the sessionset registry.
//!
//! Provides TOML-based configuration with:
//! - A `[session]` section covering TTL and sweeping
//! - Config file layering (user config dir + project-local overrides)
//! - A `SESSIONSET_TTL_SECS` environment override
//!
//! ```toml
//! [session]
//! ttl_secs = 3600
//! sweep_interval_secs = 60
//! ```

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    LoadedConfig, load_config, load_config_file, load_config_with_options, save_config,
    user_config_dir, user_config_path,
};
pub use error::{ConfigError, Result};
pub use types::{SessionSection, SessionSetConfig};
