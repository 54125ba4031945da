//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! The query and retire surface
//!
//! Listing, reading, soft deletion and permanent deletion of subjects and
//! versions, plus the exact-match schema lookup. Every operation runs in a
//! single transaction.

use std::str::FromStr;

use sqlx::SqliteConnection;

use crate::error::{RegistryError, RegistryResult};
use crate::registry::{hash, resolver, RegisterRequest, SchemaLookupView, SubjectVersionView, VersionSpec};
use crate::schema::{self, SchemaType};
use crate::storage::models::{self, SubjectRow, SubjectVersionRow};
use crate::storage::Store;

/// All subject names, order unspecified
pub async fn list_subjects(store: &Store, include_deleted: bool) -> RegistryResult<Vec<String>> {
    let mut tx = store.begin().await?;
    let subjects = models::list_subjects(&mut tx, include_deleted).await?;
    tx.commit().await?;
    Ok(subjects.into_iter().map(|s| s.name).collect())
}

/// Ascending version numbers of a live subject
pub async fn list_versions(
    store: &Store,
    subject_name: &str,
    include_deleted: bool,
    missing_as_empty: bool,
) -> RegistryResult<Vec<i32>> {
    let mut tx = store.begin().await?;
    let versions = models::list_version_numbers(&mut tx, subject_name, include_deleted).await?;

    if versions.is_empty() {
        if missing_as_empty
            && models::find_subject_by_name(&mut tx, subject_name, false)
                .await?
                .is_some()
        {
            tx.commit().await?;
            return Ok(Vec::new());
        }
        return Err(RegistryError::subject_not_found(subject_name));
    }

    tx.commit().await?;
    Ok(versions)
}

/// Load a live subject by name or fail with `SubjectNotFound`
async fn require_subject(
    conn: &mut SqliteConnection,
    subject_name: &str,
    include_deleted: bool,
) -> RegistryResult<SubjectRow> {
    models::find_subject_by_name(conn, subject_name, include_deleted)
        .await?
        .ok_or_else(|| RegistryError::subject_not_found(subject_name))
}

/// Resolve a version spec to a concrete row or fail with `VersionNotFound`
async fn require_version(
    conn: &mut SqliteConnection,
    subject: &SubjectRow,
    version: VersionSpec,
    include_deleted: bool,
) -> RegistryResult<SubjectVersionRow> {
    let row = match version {
        VersionSpec::Latest => models::latest_live_version(conn, &subject.id).await?,
        VersionSpec::Number(number) => {
            models::find_version_by_number(conn, &subject.id, number, include_deleted).await?
        }
    };
    row.ok_or_else(|| match version {
        VersionSpec::Latest => RegistryError::version_not_found("latest"),
        VersionSpec::Number(number) => RegistryError::version_not_found(&number.to_string()),
    })
}

/// One version of a subject with its schema
pub async fn get_version(
    store: &Store,
    subject_name: &str,
    version: VersionSpec,
) -> RegistryResult<SubjectVersionView> {
    let mut tx = store.begin().await?;
    let subject = require_subject(&mut tx, subject_name, false).await?;
    let row = require_version(&mut tx, &subject, version, false).await?;

    let schema_row = models::find_schema_by_row_id(&mut tx, &row.schema_id)
        .await?
        .ok_or_else(|| RegistryError::internal("subject version has no schema row"))?;
    tx.commit().await?;

    Ok(SubjectVersionView {
        subject: subject.name,
        global_id: schema_row.global_id,
        version: row.version,
        schema_type: schema_type_from_db(&schema_row.schema_type)?,
        body: schema_row.body,
    })
}

/// Global ids of schemas whose references point at this subject version
pub async fn referenced_by(
    store: &Store,
    subject_name: &str,
    version: VersionSpec,
) -> RegistryResult<Vec<i32>> {
    let mut tx = store.begin().await?;
    let subject = require_subject(&mut tx, subject_name, false).await?;
    let row = require_version(&mut tx, &subject, version, false).await?;
    let ids = models::referencing_global_ids(&mut tx, &row.id).await?;
    tx.commit().await?;
    Ok(ids)
}

/// Soft- or hard-delete a subject and all its versions
///
/// Permanent deletion requires the subject to be soft-deleted already.
pub async fn delete_subject(
    store: &Store,
    subject_name: &str,
    permanent: bool,
) -> RegistryResult<Vec<i32>> {
    let mut tx = store.begin().await?;
    let subject = require_subject(&mut tx, subject_name, true).await?;

    if permanent && subject.deleted_at.is_none() {
        return Err(RegistryError::MustSoftDeleteFirst {
            target: "subject".to_string(),
        });
    }

    let versions = if permanent {
        let versions = models::hard_delete_versions_for_subject(&mut tx, &subject.id).await?;
        models::hard_delete_subject(&mut tx, &subject.id).await?;
        versions
    } else {
        let versions = models::soft_delete_versions_for_subject(&mut tx, &subject.id).await?;
        models::soft_delete_subject(&mut tx, &subject.id).await?;
        versions
    };

    tx.commit().await?;
    tracing::info!(subject = subject_name, permanent, "deleted subject");
    Ok(versions)
}

/// Soft- or hard-delete one version of a subject
///
/// Permanent deletion targets a concrete number (`latest`/`-1` is rejected)
/// and requires the row to be soft-deleted already.
pub async fn delete_version(
    store: &Store,
    subject_name: &str,
    version: VersionSpec,
    permanent: bool,
) -> RegistryResult<i32> {
    let mut tx = store.begin().await?;
    let subject = require_subject(&mut tx, subject_name, false).await?;

    if permanent && version == VersionSpec::Latest {
        return Err(RegistryError::InvalidVersion);
    }

    // permanent deletion must see the soft-deleted row it is erasing
    let row = require_version(&mut tx, &subject, version, permanent).await?;

    if permanent && row.deleted_at.is_none() {
        return Err(RegistryError::MustSoftDeleteFirst {
            target: format!("version {}", row.version),
        });
    }

    if permanent {
        models::hard_delete_version(&mut tx, &row.id).await?;
    } else {
        models::soft_delete_version(&mut tx, &row.id).await?;
    }

    tx.commit().await?;
    tracing::info!(
        subject = subject_name,
        version = row.version,
        permanent,
        "deleted subject version"
    );
    Ok(row.version)
}

/// Find the version of a subject that exactly matches `(body, type,
/// references)`
///
/// The candidate is resolved and parsed first, so malformed requests fail
/// with `InvalidSchema` rather than a miss.
pub async fn lookup_schema(
    store: &Store,
    subject_name: &str,
    request: &RegisterRequest,
) -> RegistryResult<SchemaLookupView> {
    if request.body.is_empty() {
        return Err(RegistryError::invalid_schema("schema may not be empty"));
    }
    let request_hash = hash::canonical_hash(&request.body, &request.references)?;

    let mut tx = store.begin().await?;
    let subject = require_subject(&mut tx, subject_name, false).await?;

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
        }
    }
    schema::parse(&request.body, request.schema_type, &parse_inputs)?;

    let schema_row =
        models::find_schema_by_hash(&mut tx, &request_hash, request.schema_type.as_str())
            .await?
            .ok_or(RegistryError::SchemaNotFound)?;

    let version = models::find_version_by_subject_and_schema(&mut tx, &subject.id, &schema_row.id)
        .await?
        .ok_or(RegistryError::SchemaNotFound)?;

    tx.commit().await?;
    Ok(SchemaLookupView {
        subject: subject.name,
        global_id: schema_row.global_id,
        version: version.version,
        body: schema_row.body,
    })
}

fn schema_type_from_db(raw: &str) -> RegistryResult<SchemaType> {
    SchemaType::from_str(raw)
        .map_err(|_| RegistryError::internal(format!("unknown stored schema type: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::register::avro_request;
    use crate::registry::{Registry, RegistryOptions};

    const SCHEMA_V1: &str = r#"
    {"type": "record", "name": "R", "fields": [{"name": "f1", "type": "long"}]}
    "#;

    const SCHEMA_V2: &str = r#"
    {"type": "record", "name": "R", "fields": [
        {"name": "f1", "type": "long"},
        {"name": "f2", "type": "string"}
    ]}
    "#;

    async fn registry() -> Registry {
        Registry::new(Store::connect_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_list_subjects_respects_the_deleted_flag() {
        let registry = registry().await;
        registry.register_version("a", &avro_request(SCHEMA_V1)).await.unwrap();
        registry.register_version("b", &avro_request(SCHEMA_V1)).await.unwrap();
        registry.delete_subject("a", false).await.unwrap();

        assert_eq!(registry.list_subjects(false).await.unwrap(), vec!["b"]);
        let mut all = registry.list_subjects(true).await.unwrap();
        all.sort();
        assert_eq!(all, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_list_versions_of_unknown_subject_fails() {
        let registry = registry().await;
        assert!(matches!(
            registry.list_versions("ghost", false).await.unwrap_err(),
            RegistryError::SubjectNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_missing_versions_feature_flag() {
        let store = Store::connect_in_memory().await.unwrap();
        let registry = Registry::with_options(
            store,
            RegistryOptions {
                missing_versions_as_empty: true,
            },
        );

        registry.register_version("a", &avro_request(SCHEMA_V1)).await.unwrap();
        registry.delete_version("a", VersionSpec::Number(1), false).await.unwrap();

        // the subject is alive with no live versions: empty list under the flag
        assert_eq!(registry.list_versions("a", false).await.unwrap(), Vec::<i32>::new());
        // a subject that never existed still fails
        assert!(registry.list_versions("ghost", false).await.is_err());
    }

    #[tokio::test]
    async fn test_get_version_by_number_and_latest() {
        let registry = registry().await;
        registry.register_version("a", &avro_request(SCHEMA_V1)).await.unwrap();
        registry.register_version("a", &avro_request(SCHEMA_V2)).await.unwrap();

        let first = registry.get_version("a", VersionSpec::Number(1)).await.unwrap();
        assert_eq!(first.version, 1);
        assert_eq!(first.global_id, 1);

        let latest = registry.get_version("a", VersionSpec::Latest).await.unwrap();
        assert_eq!(latest.version, 2);

        assert!(matches!(
            registry.get_version("a", VersionSpec::Number(9)).await.unwrap_err(),
            RegistryError::VersionNotFound { .. }
        ));
        assert!(matches!(
            registry.get_version("ghost", VersionSpec::Latest).await.unwrap_err(),
            RegistryError::SubjectNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_soft_deleted_version_is_hidden_but_listable() {
        let registry = registry().await;
        registry.register_version("a", &avro_request(SCHEMA_V1)).await.unwrap();
        registry.register_version("a", &avro_request(SCHEMA_V2)).await.unwrap();
        registry.delete_version("a", VersionSpec::Number(1), false).await.unwrap();

        assert_eq!(registry.list_versions("a", false).await.unwrap(), vec![2]);
        assert_eq!(registry.list_versions("a", true).await.unwrap(), vec![1, 2]);
        assert!(registry.get_version("a", VersionSpec::Number(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_permanent_deletion_requires_soft_deletion_first() {
        let registry = registry().await;
        registry.register_version("a", &avro_request(SCHEMA_V1)).await.unwrap();

        assert!(matches!(
            registry.delete_subject("a", true).await.unwrap_err(),
            RegistryError::MustSoftDeleteFirst { .. }
        ));
        assert!(matches!(
            registry.delete_version("a", VersionSpec::Number(1), true).await.unwrap_err(),
            RegistryError::MustSoftDeleteFirst { .. }
        ));

        registry.delete_version("a", VersionSpec::Number(1), false).await.unwrap();
        assert_eq!(
            registry.delete_version("a", VersionSpec::Number(1), true).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_permanent_deletion_of_latest_spec_is_rejected() {
        let registry = registry().await;
        registry.register_version("a", &avro_request(SCHEMA_V1)).await.unwrap();
        assert!(matches!(
            registry.delete_version("a", VersionSpec::Latest, true).await.unwrap_err(),
            RegistryError::InvalidVersion
        ));
    }

    #[tokio::test]
    async fn test_hard_subject_delete_requires_prior_soft_delete_then_erases() {
        let registry = registry().await;
        registry.register_version("a", &avro_request(SCHEMA_V1)).await.unwrap();
        registry.register_version("a", &avro_request(SCHEMA_V2)).await.unwrap();

        assert_eq!(registry.delete_subject("a", false).await.unwrap(), vec![1, 2]);
        let erased = registry.delete_subject("a", true).await.unwrap();
        assert_eq!(erased, vec![1, 2]);

        assert!(registry.list_versions("a", true).await.is_err());
    }

    #[tokio::test]
    async fn test_referenced_by_reports_referencing_schemas() {
        let registry = registry().await;
        registry.register_version("one", &avro_request(SCHEMA_V1)).await.unwrap();

        let request = RegisterRequest {
            body: r#"{"type": "record", "name": "W", "fields": [{"name": "r", "type": "R"}]}"#
                .to_string(),
            schema_type: SchemaType::Avro,
            references: vec![crate::registry::SchemaReference {
                name: "R".to_string(),
                subject: "one".to_string(),
                version: 1,
            }],
        };
        let wrapper_id = registry.register_version("two", &request).await.unwrap();

        assert_eq!(
            registry.referenced_by("one", VersionSpec::Number(1)).await.unwrap(),
            vec![wrapper_id]
        );
        assert!(registry
            .referenced_by("two", VersionSpec::Number(1))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_lookup_schema_round_trip() {
        let registry = registry().await;
        registry.register_version("a", &avro_request(SCHEMA_V1)).await.unwrap();
        registry.register_version("a", &avro_request(SCHEMA_V2)).await.unwrap();

        let found = registry.lookup_schema("a", &avro_request(SCHEMA_V1)).await.unwrap();
        assert_eq!(found.subject, "a");
        assert_eq!(found.global_id, 1);
        assert_eq!(found.version, 1);

        // an unregistered body misses
        let miss = registry
            .lookup_schema(
                "a",
                &avro_request(r#"{"type": "record", "name": "R", "fields": []}"#),
            )
            .await
            .unwrap_err();
        assert!(matches!(miss, RegistryError::SchemaNotFound));

        // an unknown subject fails before the schema lookup
        assert!(matches!(
            registry.lookup_schema("ghost", &avro_request(SCHEMA_V1)).await.unwrap_err(),
            RegistryError::SubjectNotFound { .. }
        ));
    }
}
