//! Config file discovery and layered loading.
//!
//! Implements the `Config::load()` algorithm:
//! 1. Parse `defaults.toml` → base
//! 2. Merge `~/.handsoff/config.toml` (user)
//! 3. Merge the nearest `.handsoff.toml` above the workspace (project)
//! 4. Merge the nearest `.handsoff.local.toml` above the workspace (local)
//! 5. Apply environment variable overrides
//! 6. Deserialize merged tree → `Config`
//! 7. Validate
//!
//! `[permissions]` tables are lifted out of each file before merging, so the
//! rules of every layer survive side by side instead of replacing each other.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{apply_env_overrides, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::types::{Config, PermissionsConfig};
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Project configuration file name, committed with the repository.
pub const PROJECT_FILE: &str = ".handsoff.toml";

/// Local configuration file name, kept out of version control.
pub const LOCAL_FILE: &str = ".handsoff.local.toml";

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Where a configuration value or rule table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayer {
    /// Embedded defaults.
    Defaults,
    /// `~/.handsoff/config.toml`.
    User,
    /// `.handsoff.toml`.
    Project,
    /// `.handsoff.local.toml`.
    Local,
    /// Environment variables.
    Env,
}

/// The permission rules contributed by one config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerRules {
    /// The layer the rules came from.
    pub layer: ConfigLayer,
    /// The file they were read from.
    pub path: PathBuf,
    /// The rules themselves.
    pub permissions: PermissionsConfig,
}

/// A fully loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    /// The merged, validated configuration.
    pub config: Config,
    /// Permission rules per layer, in precedence order (project before local).
    pub rules: Vec<LayerRules>,
    /// Files that contributed, in merge order.
    pub loaded_files: Vec<PathBuf>,
}

/// Load configuration for `workspace`, reading the process environment.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, or if the
/// final merged configuration fails validation.
pub fn load(workspace: Option<&Path>) -> ConfigResult<LoadedConfig> {
    load_with(workspace, user_dir().as_deref(), &collect_env_vars())
}

/// The user-level config directory, `~/.handsoff`.
#[must_use]
pub fn user_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().join(".handsoff"))
}

/// Load configuration with explicit user directory and environment.
///
/// `user_dir` is the directory holding the user-level `config.toml`
/// (normally `~/.handsoff`); `None` skips the user layer.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, or if the
/// final merged configuration fails validation.
pub fn load_with(
    workspace: Option<&Path>,
    user_dir: Option<&Path>,
    env: &HashMap<String, String>,
) -> ConfigResult<LoadedConfig> {
    // 1. Embedded defaults.
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    let mut loaded = LoadedConfig::default();

    // 2-4. File layers, lowest precedence first.
    for (layer, path) in layer_files(workspace, user_dir) {
        let Some(mut overlay) = try_load_file(&path)? else {
            continue;
        };

        let permissions = take_permissions(&mut overlay, &path)?;
        if !permissions.is_empty() {
            loaded.rules.push(LayerRules {
                layer,
                path: path.clone(),
                permissions,
            });
        }

        deep_merge(&mut merged, &overlay);
        info!(path = %path.display(), layer = ?layer, "loaded config");
        loaded.loaded_files.push(path);
    }

    // 5. Environment.
    let applied = apply_env_overrides(&mut merged, env);
    if applied > 0 {
        debug!(count = applied, "applied environment overrides");
    }

    // 6. Deserialize.
    let mut config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    // 7. Validate.
    validate::validate(&mut config)?;

    loaded.config = config;
    Ok(loaded)
}

/// Load only the `[permissions]` tables of every layer, reading the user
/// directory from the process environment.
///
/// # Errors
///
/// Returns a [`ConfigError`] if a config file cannot be read or parsed, or
/// if its `[permissions]` table is malformed.
pub fn load_rules(workspace: Option<&Path>) -> ConfigResult<Vec<LayerRules>> {
    load_rules_with(workspace, user_dir().as_deref())
}

/// Load only the `[permissions]` tables of every layer.
///
/// The rest of each file is ignored, so an invalid `[server]` or `[judge]`
/// section cannot hide the rules next to it.
///
/// # Errors
///
/// Returns a [`ConfigError`] if a config file cannot be read or parsed, or
/// if its `[permissions]` table is malformed.
pub fn load_rules_with(
    workspace: Option<&Path>,
    user_dir: Option<&Path>,
) -> ConfigResult<Vec<LayerRules>> {
    let mut rules = Vec::new();
    for (layer, path) in layer_files(workspace, user_dir) {
        let Some(mut overlay) = try_load_file(&path)? else {
            continue;
        };
        let permissions = take_permissions(&mut overlay, &path)?;
        if !permissions.is_empty() {
            rules.push(LayerRules {
                layer,
                path,
                permissions,
            });
        }
    }
    Ok(rules)
}

/// Candidate files, lowest precedence first. Files may not exist.
fn layer_files(workspace: Option<&Path>, user_dir: Option<&Path>) -> Vec<(ConfigLayer, PathBuf)> {
    let mut candidates = Vec::new();
    if let Some(dir) = user_dir {
        candidates.push((ConfigLayer::User, dir.join("config.toml")));
    }
    if let Some(ws) = workspace {
        if let Some(path) = find_upwards(ws, PROJECT_FILE) {
            candidates.push((ConfigLayer::Project, path));
        }
        if let Some(path) = find_upwards(ws, LOCAL_FILE) {
            candidates.push((ConfigLayer::Local, path));
        }
    }
    candidates
}

/// Load a config from a specific file path (no layering, no environment).
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let Some(overlay) = try_load_file(path)? else {
        return Err(ConfigError::ReadError {
            path: path.display().to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
    };

    let mut config: Config = overlay
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError {
            path: path.display().to_string(),
            source: e,
        })?;
    validate::validate(&mut config)?;
    Ok(config)
}

/// Find `name` in `start` or the nearest ancestor directory.
#[must_use]
pub fn find_upwards(start: &Path, name: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Try to load a file, returning `None` if the file doesn't exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {} byte limit",
                content.len(),
                MAX_CONFIG_FILE_SIZE
            ),
        });
    }

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(Some(value))
}

/// Remove and decode the `[permissions]` table of one file.
fn take_permissions(overlay: &mut toml::Value, path: &Path) -> ConfigResult<PermissionsConfig> {
    let Some(raw) = overlay
        .as_table_mut()
        .and_then(|table| table.remove("permissions"))
    else {
        return Ok(PermissionsConfig::default());
    };

    raw.try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError {
            path: path.display().to_string(),
            source: e,
        })
}

/// Recursively deep-merge `overlay` into `base`.
///
/// Tables merge per key; scalars and arrays from the overlay replace.
fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                if let Some(base_val) = base_table.get_mut(key) {
                    deep_merge(base_val, overlay_val);
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_deserialize_to_default_config() {
        let from_toml: Config = toml::from_str(DEFAULTS_TOML).unwrap();
        let built_in = Config::default();
        assert_eq!(from_toml.judge, built_in.judge);
        assert_eq!(from_toml.approval, built_in.approval);
        assert_eq!(from_toml.server, built_in.server);
        assert_eq!(from_toml.tracker, built_in.tracker);
        assert_eq!(from_toml.audit, built_in.audit);
    }

    #[test]
    fn deep_merge_replaces_scalars_and_keeps_siblings() {
        let mut base: toml::Value =
            toml::from_str("[server]\nperiod = \"5m\"\nnum_workers = 5\n").unwrap();
        let overlay: toml::Value = toml::from_str("[server]\nnum_workers = 2\n").unwrap();
        deep_merge(&mut base, &overlay);
        assert_eq!(base["server"]["period"].as_str(), Some("5m"));
        assert_eq!(base["server"]["num_workers"].as_integer(), Some(2));
    }

    #[test]
    fn missing_file_is_skipped() {
        let result = try_load_file(Path::new("/nonexistent/.handsoff.toml")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn load_file_reports_missing_file() {
        let result = load_file(Path::new("/nonexistent/.handsoff.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn oversized_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("huge.toml");
        let data = "x = \"".to_owned() + &"a".repeat(1_100_000) + "\"";
        std::fs::write(&file_path, data).unwrap();

        let result = try_load_file(&file_path);
        assert!(
            matches!(result, Err(ConfigError::ValidationError { .. })),
            "Expected ValidationError for oversized config, got: {result:?}"
        );
    }

    #[test]
    fn find_upwards_walks_ancestors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PROJECT_FILE), "").unwrap();
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(
            find_upwards(&nested, PROJECT_FILE),
            Some(dir.path().join(PROJECT_FILE))
        );
        assert_eq!(find_upwards(&nested, "no-such-file.toml"), None);
    }
}
