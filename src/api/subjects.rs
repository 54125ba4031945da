//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Endpoint handlers for the subjects surface

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::Json;

use crate::error::RegistryError;
use crate::registry::{Registry, VersionSpec};

use super::requests::{parse_flag, DeletedQuery, PermanentQuery, SchemaBody};
use super::responses::{
    HealthResponse, RegisterSchemaResponse, SchemaLookupResponse, SubjectVersionResponse,
};

/// `GET /health`
pub async fn health(
    State(registry): State<Arc<Registry>>,
) -> Result<Json<HealthResponse>, RegistryError> {
    registry.store().health_check().await?;
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
    }))
}

/// `GET /subjects?deleted=`
pub async fn list_subjects(
    State(registry): State<Arc<Registry>>,
    Query(query): Query<DeletedQuery>,
) -> Result<Json<Vec<String>>, RegistryError> {
    let include_deleted = parse_flag(query.deleted.as_deref());
    Ok(Json(registry.list_subjects(include_deleted).await?))
}

/// `GET /subjects/{subject}/versions?deleted=`
pub async fn list_versions(
    State(registry): State<Arc<Registry>>,
    Path(subject): Path<String>,
    Query(query): Query<DeletedQuery>,
) -> Result<Json<Vec<i32>>, RegistryError> {
    let include_deleted = parse_flag(query.deleted.as_deref());
    Ok(Json(registry.list_versions(&subject, include_deleted).await?))
}

/// `POST /subjects/{subject}/versions`
pub async fn register_version(
    State(registry): State<Arc<Registry>>,
    Path(subject): Path<String>,
    Json(body): Json<SchemaBody>,
) -> Result<Json<RegisterSchemaResponse>, RegistryError> {
    let request = body.into_register_request()?;
    let id = registry.register_version(&subject, &request).await?;
    Ok(Json(RegisterSchemaResponse { id }))
}

/// `POST /subjects/{subject}` — exact-match lookup
pub async fn lookup_subject(
    State(registry): State<Arc<Registry>>,
    Path(subject): Path<String>,
    Json(body): Json<SchemaBody>,
) -> Result<Json<SchemaLookupResponse>, RegistryError> {
    let request = body.into_register_request()?;
    let found = registry.lookup_schema(&subject, &request).await?;
    Ok(Json(found.into()))
}

/// `GET /subjects/{subject}/versions/{version}`
pub async fn get_version(
    State(registry): State<Arc<Registry>>,
    Path((subject, version)): Path<(String, String)>,
) -> Result<Json<SubjectVersionResponse>, RegistryError> {
    let spec = VersionSpec::parse(&version)?;
    let view = registry.get_version(&subject, spec).await?;
    Ok(Json(view.into()))
}

/// `GET /subjects/{subject}/versions/{version}/schema` — raw body
pub async fn get_version_schema(
    State(registry): State<Arc<Registry>>,
    Path((subject, version)): Path<(String, String)>,
) -> Result<String, RegistryError> {
    let spec = VersionSpec::parse(&version)?;
    registry.get_version_body(&subject, spec).await
}

/// `GET /subjects/{subject}/versions/{version}/referencedby`
pub async fn referenced_by(
    State(registry): State<Arc<Registry>>,
    Path((subject, version)): Path<(String, String)>,
) -> Result<Json<Vec<i32>>, RegistryError> {
    let spec = VersionSpec::parse(&version)?;
    Ok(Json(registry.referenced_by(&subject, spec).await?))
}

/// `DELETE /subjects/{subject}?permanent=`
pub async fn delete_subject(
    State(registry): State<Arc<Registry>>,
    Path(subject): Path<String>,
    Query(query): Query<PermanentQuery>,
) -> Result<Json<Vec<i32>>, RegistryError> {
    let permanent = parse_flag(query.permanent.as_deref());
    Ok(Json(registry.delete_subject(&subject, permanent).await?))
}

/// `DELETE /subjects/{subject}/versions/{version}?permanent=`
pub async fn delete_version(
    State(registry): State<Arc<Registry>>,
    Path((subject, version)): Path<(String, String)>,
    Query(query): Query<PermanentQuery>,
) -> Result<Json<i32>, RegistryError> {
    let permanent = parse_flag(query.permanent.as_deref());
    let spec = VersionSpec::parse(&version)?;
    Ok(Json(registry.delete_version(&subject, spec, permanent).await?))
}
