//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - inferox.toml (default configuration)
//! - inferox.local.toml (git-ignored local overrides)
//! - Environment variables (INFEROX_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # inferox.toml
//! [engine]
//! max_rounds = 10
//! iteration_limit = 100
//!
//! [cache]
//! enabled = true
//! dir = "/var/cache/inferox"
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! INFEROX_ENGINE__MAX_ROUNDS=25
//! INFEROX_CACHE__DIR=/custom/path
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Fixed-point driver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum outer inference rounds before reporting non-convergence
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,

    /// Hard cap on inner iterations per rules file
    #[serde(default = "default_iteration_limit")]
    pub iteration_limit: usize,

    /// Trace the triples added in each inner iteration
    #[serde(default)]
    pub debug_diff: bool,

    /// Drop unrecognized rule built-ins instead of failing compilation
    #[serde(default)]
    pub lenient_builtins: bool,
}

/// Result cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Directory for cached inference results
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_max_rounds() -> usize {
    10
}
fn default_iteration_limit() -> usize {
    100
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from("/tmp")
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_rounds: default_max_rounds(),
            iteration_limit: default_iteration_limit(),
            debug_diff: false,
            lenient_builtins: false,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            enabled: false,
            dir: default_cache_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Merges in order:
    /// 1. inferox.toml (base configuration)
    /// 2. inferox.local.toml (local overrides, git-ignored)
    /// 3. Environment variables (INFEROX_* prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("inferox.toml"))
            .merge(Toml::file("inferox.local.toml"))
            .merge(Env::prefixed("INFEROX_").split("__"))
            .extract()
    }

    /// Load configuration from a specific file path
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("INFEROX_").split("__"))
            .extract()
    }
}
