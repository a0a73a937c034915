//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: API_PROBLEM_, nesting separator `__`)
//! 2. Current working directory: ./config.toml
//! 3. XDG config directory: ~/.config/api-problem/{service_name}/config.toml
//! 4. System directory: /etc/api-problem/{service_name}/config.toml
//! 5. Default values

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

const APP_PREFIX: &str = "api-problem";
const ENV_PREFIX: &str = "API_PROBLEM_";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,

    /// Supported media types
    #[serde(default)]
    pub negotiation: NegotiationConfig,

    /// Failure translation
    #[serde(default)]
    pub problems: ProblemsConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name, also used to locate config files
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Log level filter
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Deployment environment label (dev, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            environment: default_environment(),
        }
    }
}

/// Media types offered to and accepted from clients, in preference order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegotiationConfig {
    /// Candidates for `Accept`
    #[serde(default = "default_media_types")]
    pub accept: Vec<String>,

    /// Accepted `Content-Type` values for requests with a body
    #[serde(default = "default_media_types")]
    pub content_type: Vec<String>,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            accept: default_media_types(),
            content_type: default_media_types(),
        }
    }
}

/// Failure translation settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProblemsConfig {
    /// Include failure messages and backtraces in 500 responses.
    /// Never enable in production.
    #[serde(default)]
    pub debug: bool,
}

fn default_service_name() -> String {
    APP_PREFIX.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_media_types() -> Vec<String> {
    vec!["application/json".to_string()]
}

impl Config {
    /// Load configuration from all sources
    ///
    /// The service name is inferred from the binary name.
    pub fn load() -> Result<Self> {
        let service_name = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(default_service_name);

        Self::load_for_service(&service_name)
    }

    /// Load configuration for a specific service name
    pub fn load_for_service(service_name: &str) -> Result<Self> {
        let config_paths = Self::find_config_paths(service_name);

        tracing::debug!("Searching for config files in order:");
        for path in &config_paths {
            tracing::debug!("  - {}", path.display());
        }

        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Lowest priority first so later files override earlier ones
        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config = figment.extract()?;
        Ok(config)
    }

    /// Load configuration from a specific file, bypassing the search paths
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }

    /// Candidate config files, highest priority first
    fn find_config_paths(service_name: &str) -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        let xdg_dirs = xdg::BaseDirectories::with_prefix(APP_PREFIX);
        let config_file_path = Path::new(service_name).join("config.toml");
        if let Some(path) = xdg_dirs.find_config_file(&config_file_path) {
            paths.push(path);
        }

        paths.push(
            PathBuf::from("/etc")
                .join(APP_PREFIX)
                .join(service_name)
                .join("config.toml"),
        );

        paths
    }
}
