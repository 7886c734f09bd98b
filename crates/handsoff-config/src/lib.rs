#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Layered configuration for handsoff.
//!
//! # Usage
//!
//! ```rust,no_run
//! use handsoff_config::Config;
//!
//! let loaded = Config::load(Some(std::path::Path::new("."))).unwrap();
//! println!("poll period: {}", loaded.config.server.period);
//! ```
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Command-line flags** (applied by the binary)
//! 2. **Environment variables** (`HANDSOFF_*`, `TG_*`)
//! 3. **Local** (nearest `.handsoff.local.toml`)
//! 4. **Project** (nearest `.handsoff.toml`)
//! 5. **User** (`~/.handsoff/config.toml`)
//! 6. **Embedded defaults** (`defaults.toml` compiled into binary)
//!
//! `[permissions]` tables do not override one another: each layer's rules
//! are returned separately in [`LoadedConfig::rules`].

/// Environment variable overrides.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLayer, LayerRules, LoadedConfig};
pub use types::*;

impl Config {
    /// Load configuration with the full precedence chain.
    ///
    /// See [`loader::load`] for the full algorithm.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the final
    /// configuration fails validation.
    pub fn load(workspace: Option<&std::path::Path>) -> ConfigResult<LoadedConfig> {
        loader::load(workspace)
    }

    /// Load configuration from a single file (no layering).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }
}
