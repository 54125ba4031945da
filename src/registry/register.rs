//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! The registration pipeline
//!
//! One transaction creates or idempotently returns `(globalId, version)`:
//! resolve references, parse, load-or-create the subject, gate on the
//! compatibility policy, dedup-or-create the schema row, then assign the
//! next version number. Request validation (empty body, duplicate reference
//! names) happens before the transaction begins.

use std::collections::HashMap;

use chrono::Utc;

use crate::error::{RegistryError, RegistryResult};
use crate::registry::{compatibility, hash, resolver, RegisterRequest};
use crate::storage::models::{self, SchemaReferenceRow, SchemaRow, SubjectRow, SubjectVersionRow};
use crate::storage::sequence::{self, SEQUENCE_SCHEMA_IDS};
use crate::schema;
use crate::storage::Store;

/// Register a schema under a subject and return its global id
pub async fn register_version(
    store: &Store,
    subject_name: &str,
    request: &RegisterRequest,
) -> RegistryResult<i32> {
    if request.body.is_empty() {
        return Err(RegistryError::invalid_schema("schema may not be empty"));
    }
    let request_hash = hash::canonical_hash(&request.body, &request.references)?;

    let mut tx = store.begin().await?;

    // resolve references; duplicate names across expansions overwrite, the
    // later reference wins
    let mut resolved_targets: HashMap<String, String> = HashMap::new();
    let mut parse_inputs: Vec<(String, String)> = Vec::new();
    for reference in &request.references {
        let resolved = resolver::resolve_reference(
            &mut tx,
            &reference.name,
            &reference.subject,
            reference.version,
            request.schema_type,
        )
        .await?;

        for target in resolved {
            resolver::upsert_parse_input(&mut parse_inputs, &target.name, &target.body);
            resolved_targets.insert(target.name, target.version_id);
        }
    }

    let parsed = schema::parse(&request.body, request.schema_type, &parse_inputs)?;

    // load-or-create the subject; a soft-deleted subject comes back to life
    let subject = match models::find_subject_by_name(&mut tx, subject_name, true).await? {
        Some(existing) => {
            if existing.deleted_at.is_some() {
                models::undelete_subject(&mut tx, &existing.id).await?;
            }
            existing
        }
        None => {
            let now = Utc::now();
            let created = SubjectRow {
                id: models::new_row_id(),
                name: subject_name.to_string(),
                compatibility: compatibility::CompatibilityLevel::Backward.as_str().to_string(),
                created_at: now,
                updated_at: now,
                deleted_at: None,
            };
            models::insert_subject(&mut tx, &created).await?;
            created
        }
    };

    compatibility::check_compatibility(&mut tx, &subject, &parsed, request.schema_type).await?;

    // dedup by canonical hash; a known schema reuses its global id and a new
    // one consumes the next sequence value
    let type_name = request.schema_type.as_str();
    let schema_row = match models::find_schema_by_hash(&mut tx, &request_hash, type_name).await? {
        Some(existing) => existing,
        None => {
            let next_id = sequence::next_sequence_id(&mut tx, SEQUENCE_SCHEMA_IDS).await?;
            if next_id > i64::from(i32::MAX) {
                return Err(RegistryError::internal(
                    "too many schemas registered, next schema id is greater than int32",
                ));
            }

            let now = Utc::now();
            let created = SchemaRow {
                id: models::new_row_id(),
                global_id: next_id as i32,
                body: request.body.clone(),
                hash: request_hash.clone(),
                schema_type: type_name.to_string(),
                created_at: now,
                updated_at: now,
                deleted_at: None,
            };
            models::insert_schema(&mut tx, &created).await?;

            for reference in &request.references {
                let version_id = resolved_targets.get(&reference.name).ok_or_else(|| {
                    RegistryError::internal(format!(
                        "resolved reference {} disappeared",
                        reference.name
                    ))
                })?;
                let edge = SchemaReferenceRow {
                    id: models::new_row_id(),
                    schema_id: created.id.clone(),
                    subject_version_id: version_id.clone(),
                    name: reference.name.clone(),
                    created_at: now,
                };
                models::insert_schema_reference(&mut tx, &edge).await?;
            }

            created
        }
    };

    // an existing live (subject, schema) binding makes the call idempotent
    if models::find_version_by_subject_and_schema(&mut tx, &subject.id, &schema_row.id)
        .await?
        .is_none()
    {
        let mut next_version = 1;
        // soft-deleted versions still consume numbers and pin the type
        if let Some(latest) = models::latest_version_any(&mut tx, &subject.id).await? {
            next_version = latest.version + 1;

            let latest_schema = models::find_schema_by_row_id(&mut tx, &latest.schema_id)
                .await?
                .ok_or_else(|| {
                    RegistryError::internal("latest subject version has no schema row")
                })?;
            if latest_schema.schema_type != schema_row.schema_type {
                return Err(RegistryError::SchemaTypeMismatch);
            }
        }

        let version = SubjectVersionRow {
            id: models::new_row_id(),
            subject_id: subject.id.clone(),
            schema_id: schema_row.id.clone(),
            version: next_version,
            created_at: Utc::now(),
            deleted_at: None,
        };
        models::insert_subject_version(&mut tx, &version).await?;

        tracing::debug!(
            subject = subject_name,
            version = next_version,
            global_id = schema_row.global_id,
            "registered new subject version"
        );
    }

    tx.commit().await?;
    Ok(schema_row.global_id)
}

/// Convenience constructor for Avro registration requests
#[cfg(test)]
pub(crate) fn avro_request(body: &str) -> RegisterRequest {
    RegisterRequest {
        body: body.to_string(),
        schema_type: schema::SchemaType::Avro,
        references: Vec::new(),
    }
}
