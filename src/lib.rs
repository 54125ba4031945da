//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Schema registry for event-streaming pipelines
//!
//! A network service that stores versioned, typed message schemas, assigns
//! them globally unique ids, and gates every new version of a subject
//! through a compatibility check against prior versions.

pub mod api;
pub mod config;
pub mod error;
pub mod registry;
pub mod schema;
pub mod storage;

use std::sync::Arc;

// Re-export main types
pub use config::RegistryConfig;
pub use error::{RegistryError, RegistryResult};
pub use registry::{Registry, RegistryOptions};
pub use schema::SchemaType;
pub use storage::Store;

/// Schema registry version
pub const SCHEMA_REGISTRY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Schema registry service name
pub const SCHEMA_REGISTRY_NAME: &str = "schema-registry";

/// The wired-up service: configuration, storage and registry
pub struct SchemaRegistry {
    /// Configuration
    config: RegistryConfig,
    /// Registry core
    registry: Arc<Registry>,
}

impl SchemaRegistry {
    /// Connect to storage, run migrations and wire up the registry
    pub async fn connect(config: RegistryConfig) -> RegistryResult<Self> {
        config.validate()?;

        let store = Store::connect(&config.storage).await?;
        let options = RegistryOptions {
            missing_versions_as_empty: config.api.missing_versions_as_empty,
        };
        let registry = Arc::new(Registry::with_options(store, options));

        Ok(Self { config, registry })
    }

    /// The registry core
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Build the HTTP router
    pub fn router(&self) -> axum::Router {
        api::build_router(self.registry.clone(), &self.config.api)
    }

    /// Serve until stopped
    pub async fn serve(&self) -> RegistryResult<()> {
        api::serve(self.registry.clone(), &self.config.api).await
    }

    /// Close the connection pool
    pub async fn shutdown(self) {
        self.registry.store().close().await;
        tracing::info!("schema registry shutdown completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_service_wires_up_with_in_memory_storage() {
        let mut config = RegistryConfig::default();
        config.storage.database_url = "sqlite::memory:".to_string();
        config.storage.max_connections = 1;

        let service = SchemaRegistry::connect(config).await.unwrap();
        let _router = service.router();
        service.shutdown().await;
    }

    #[test]
    fn test_service_constants() {
        assert_eq!(SCHEMA_REGISTRY_NAME, "schema-registry");
        assert!(!SCHEMA_REGISTRY_VERSION.is_empty());
    }
}
