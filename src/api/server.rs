//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Router construction and the server loop

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;

use crate::config::ApiConfig;
use crate::error::{RegistryError, RegistryResult};
use crate::registry::Registry;

use super::middleware;
use super::subjects;

/// Build the router over a registry
pub fn build_router(registry: Arc<Registry>, config: &ApiConfig) -> Router {
    let deadline = Duration::from_secs(config.request_timeout_secs);

    Router::new()
        .route("/health", get(subjects::health))
        .route("/subjects", get(subjects::list_subjects))
        .route(
            "/subjects/{subject}",
            post(subjects::lookup_subject).delete(subjects::delete_subject),
        )
        .route(
            "/subjects/{subject}/versions",
            get(subjects::list_versions).post(subjects::register_version),
        )
        .route(
            "/subjects/{subject}/versions/{version}",
            get(subjects::get_version).delete(subjects::delete_version),
        )
        .route(
            "/subjects/{subject}/versions/{version}/schema",
            get(subjects::get_version_schema),
        )
        .route(
            "/subjects/{subject}/versions/{version}/referencedby",
            get(subjects::referenced_by),
        )
        .with_state(registry)
        .layer(axum::middleware::from_fn_with_state(
            deadline,
            middleware::deadline_middleware,
        ))
        .layer(axum::middleware::from_fn(middleware::logging_middleware))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
}

/// Bind and serve until the process is stopped
pub async fn serve(registry: Arc<Registry>, config: &ApiConfig) -> RegistryResult<()> {
    let app = build_router(registry, config);

    let addr = SocketAddr::from_str(&format!("{}:{}", config.host, config.port))
        .map_err(|e| RegistryError::config(format!("invalid listen address: {e}")))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| RegistryError::internal(format!("failed to bind {addr}: {e}")))?;

    tracing::info!(%addr, "schema registry listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| RegistryError::internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::storage::Store;

    #[tokio::test]
    async fn test_router_builds() {
        let store = Store::connect_in_memory().await.unwrap();
        let registry = Arc::new(Registry::new(store));
        let _router = build_router(registry, &ApiConfig::default());
    }
}
