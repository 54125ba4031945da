//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Configuration management for the schema registry
//!
//! This module provides configuration structures and validation for
//! the schema registry service.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{RegistryError, RegistryResult};

/// Schema registry configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RegistryConfig {
    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Bind host
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Per-request deadline in seconds
    pub request_timeout_secs: u64,

    /// When true, listing versions of a subject that exists but has no live
    /// versions returns an empty list instead of a subject-not-found error
    pub missing_versions_as_empty: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
            request_timeout_secs: 60,
            missing_versions_as_empty: false,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database URL, e.g. `sqlite:schema_registry.db`
    pub database_url: String,

    /// Maximum number of pooled connections
    pub max_connections: u32,

    /// How long a connection waits on a locked database before failing
    pub busy_timeout_secs: u64,

    /// Create the database file if it does not exist
    pub create_if_missing: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:schema_registry.db".to_string(),
            max_connections: 10,
            busy_timeout_secs: 5,
            create_if_missing: true,
        }
    }
}

impl RegistryConfig {
    /// Load configuration from a TOML file with environment overrides
    ///
    /// Environment variables use the `SCHEMA_REGISTRY__` prefix with `__` as
    /// the section separator, e.g. `SCHEMA_REGISTRY__API__PORT=9090`.
    pub fn from_file(path: &Path) -> RegistryResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("SCHEMA_REGISTRY").separator("__"))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment overrides on top of defaults
    pub fn load_with_defaults() -> RegistryResult<Self> {
        let defaults = Self::default();
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&defaults)?)
            .add_source(config::Environment::with_prefix("SCHEMA_REGISTRY").separator("__"))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> RegistryResult<()> {
        if self.api.host.is_empty() {
            return Err(RegistryError::config("api.host may not be empty"));
        }

        if self.api.request_timeout_secs == 0 {
            return Err(RegistryError::config(
                "api.request_timeout_secs must be greater than zero",
            ));
        }

        if self.storage.database_url.is_empty() {
            return Err(RegistryError::config("storage.database_url may not be empty"));
        }

        if self.storage.max_connections == 0 {
            return Err(RegistryError::config(
                "storage.max_connections must be greater than zero",
            ));
        }

        Ok(())
    }
}
