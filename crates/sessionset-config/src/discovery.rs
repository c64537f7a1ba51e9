//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/sessionset/config.toml` (user config)
//! 2. `./sessionset.toml` (project-local)
//! 3. `SESSIONSET_TTL_SECS` environment variable

use std::path::{Path, PathBuf};

use crate::{ConfigError, Result, SessionSetConfig};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "sessionset.toml";

/// Default config filename within the user config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for config directory resolution.
const APP_NAME: &str = "sessionset";

/// Environment variable to override the config directory.
///
/// When set, this takes precedence over the platform default.
const CONFIG_DIR_ENV: &str = "SESSIONSET_CONFIG_DIR";

/// Environment variable overriding `session.ttl_secs`.
const TTL_ENV: &str = "SESSIONSET_TTL_SECS";

/// Tracks where each config layer was loaded from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Path to the config file.
    pub path: PathBuf,
    /// Whether the file was found and loaded.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: SessionSetConfig,
    /// Sources that were checked, in order of precedence (lowest first).
    pub sources: Vec<ConfigSource>,
    /// Warnings generated during loading (e.g. malformed files).
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Get paths of sources that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Load configuration by discovering and merging all config layers.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Load configuration with explicit control over the user config directory.
///
/// `config_dir` overrides both `SESSIONSET_CONFIG_DIR` and the platform
/// default.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut config = SessionSetConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    let user_config_path = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => user_config_path(),
    };
    if let Some(path) = user_config_path {
        sources.push(load_layer(&mut config, &path, &mut warnings));
    }

    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut config, &project_path, &mut warnings));

    apply_env_overrides(&mut config, |key| std::env::var(key).ok(), &mut warnings);

    Ok(LoadedConfig {
        config,
        sources,
        warnings,
    })
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<SessionSetConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    SessionSetConfig::from_toml(&contents)
}

/// Save configuration to a file.
///
/// Creates parent directories if they don't exist.
pub fn save_config(config: &SessionSetConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let contents = config.to_toml()?;
    std::fs::write(path, contents).map_err(|e| ConfigError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}

/// Path of the user config file.
pub fn user_config_path() -> Option<PathBuf> {
    user_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// User config directory: `SESSIONSET_CONFIG_DIR`, else the platform
/// config dir joined with `sessionset`.
pub fn user_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Try to load a config file and merge it into the existing config.
///
/// Missing files are skipped; malformed ones are reported as warnings.
fn load_layer(
    config: &mut SessionSetConfig,
    path: &Path,
    warnings: &mut Vec<String>,
) -> ConfigSource {
    let loaded = path.is_file()
        && match load_config_file(path) {
            Ok(layer) => {
                config.merge(layer);
                true
            }
            Err(e) => {
                warnings.push(format!("Failed to load {}: {}", path.display(), e));
                false
            }
        };

    ConfigSource {
        path: path.to_path_buf(),
        loaded,
    }
}

fn apply_env_overrides<F>(config: &mut SessionSetConfig, lookup: F, warnings: &mut Vec<String>)
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(TTL_ENV) else {
        return;
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) => config.session.ttl_secs = Some(secs),
        Err(_) => warnings.push(format!("Ignoring {TTL_ENV}={raw:?}: not a number of seconds")),
    }
}
