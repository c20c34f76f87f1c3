//! Configuration management for protoreg
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! and turns the result into a [`ProtocolRegistry`] whose initializer chain
//! mirrors the `[[rules]]` tables, in file order.
//!
//! # Usage
//!
//! ```no_run
//! use protoreg::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! let registry = config.build_registry().expect("Failed to assemble registry");
//! println!("Serving protocols: {:?}", registry.protocols());
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `PROTOREG__<section>__<key>`
//!
//! Examples:
//! - `PROTOREG__HTTP__TIMEOUT_MS=5000`
//! - `PROTOREG__REGISTRY__INSTALL=true`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/protoreg.toml`.
//! This can be overridden using the `PROTOREG_CONFIG` environment variable.

mod assembly;
mod models;
mod sources;
mod validation;

pub use assembly::{AssemblyError, rule_initializers, rule_predicate};
pub use models::{Config, HttpConfig, IdentityConfig, RegistrySettings, RuleConfig};
pub use validation::ValidationError;

use crate::handlers::ProtocolRegistry;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("Registry assembly failed: {0}")]
    AssemblyError(#[from] AssemblyError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`PROTOREG__*`)
    /// 2. TOML file (default: `config/protoreg.toml`)
    /// 3. Default values
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file is malformed
    /// - Validation fails (duplicate rule names, malformed identities, etc.)
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Render the configuration as TOML, in the same shape it is loaded from
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Assemble a registry from this configuration
    ///
    /// Installs it as the process-wide factory target when `registry.install`
    /// is set.
    pub fn build_registry(&self) -> Result<ProtocolRegistry, ConfigError> {
        Ok(assembly::build_registry(self)?)
    }
}
