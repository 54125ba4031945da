//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Row types and queries for the registry relations
//!
//! Every function takes a `&mut SqliteConnection` so callers decide the
//! transaction boundary. Reads that must see soft-deleted rows take an
//! `include_deleted` flag.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};
use uuid::Uuid;

use crate::error::RegistryResult;

/// A subject row
#[derive(Debug, Clone, FromRow)]
pub struct SubjectRow {
    pub id: String,
    pub name: String,
    pub compatibility: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A schema row; `global_id` is the client-visible identifier
#[derive(Debug, Clone, FromRow)]
pub struct SchemaRow {
    pub id: String,
    pub global_id: i32,
    pub body: String,
    pub hash: String,
    pub schema_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A subject-version row binding a subject to a schema
#[derive(Debug, Clone, FromRow)]
pub struct SubjectVersionRow {
    pub id: String,
    pub subject_id: String,
    pub schema_id: String,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A reference edge from a schema to the subject version it depends on
#[derive(Debug, Clone, FromRow)]
pub struct SchemaReferenceRow {
    pub id: String,
    pub schema_id: String,
    pub subject_version_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A subject version joined with its schema
#[derive(Debug, Clone, FromRow)]
pub struct VersionSchemaRow {
    pub version_id: String,
    pub subject_id: String,
    pub schema_id: String,
    pub version: i32,
    pub global_id: i32,
    pub body: String,
    pub schema_type: String,
}

/// A reference edge joined with its target version and schema
#[derive(Debug, Clone, FromRow)]
pub struct ReferenceTargetRow {
    pub name: String,
    pub version_id: String,
    pub subject_id: String,
    pub schema_id: String,
    pub version: i32,
    pub global_id: i32,
    pub body: String,
    pub schema_type: String,
}

/// Generate a fresh row id
pub fn new_row_id() -> String {
    Uuid::new_v4().to_string()
}

// ---------------------------------------------------------------------------
// subjects

pub async fn find_subject_by_name(
    conn: &mut SqliteConnection,
    name: &str,
    include_deleted: bool,
) -> RegistryResult<Option<SubjectRow>> {
    let sql = if include_deleted {
        "SELECT * FROM subjects WHERE name = ?"
    } else {
        "SELECT * FROM subjects WHERE name = ? AND deleted_at IS NULL"
    };

    let row = sqlx::query_as::<_, SubjectRow>(sql)
        .bind(name)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

pub async fn insert_subject(
    conn: &mut SqliteConnection,
    subject: &SubjectRow,
) -> RegistryResult<()> {
    sqlx::query(
        r#"
        INSERT INTO subjects (id, name, compatibility, created_at, updated_at, deleted_at)
        VALUES (?, ?, ?, ?, ?, NULL)
        "#,
    )
    .bind(&subject.id)
    .bind(&subject.name)
    .bind(&subject.compatibility)
    .bind(subject.created_at)
    .bind(subject.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn undelete_subject(conn: &mut SqliteConnection, subject_id: &str) -> RegistryResult<()> {
    sqlx::query("UPDATE subjects SET deleted_at = NULL, updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(subject_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn list_subjects(
    conn: &mut SqliteConnection,
    include_deleted: bool,
) -> RegistryResult<Vec<SubjectRow>> {
    let sql = if include_deleted {
        "SELECT * FROM subjects"
    } else {
        "SELECT * FROM subjects WHERE deleted_at IS NULL"
    };

    let rows = sqlx::query_as::<_, SubjectRow>(sql).fetch_all(conn).await?;
    Ok(rows)
}

pub async fn soft_delete_subject(
    conn: &mut SqliteConnection,
    subject_id: &str,
) -> RegistryResult<()> {
    let now = Utc::now();
    sqlx::query("UPDATE subjects SET deleted_at = ?, updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(now)
        .bind(subject_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn hard_delete_subject(
    conn: &mut SqliteConnection,
    subject_id: &str,
) -> RegistryResult<()> {
    sqlx::query("DELETE FROM subjects WHERE id = ?")
        .bind(subject_id)
        .execute(conn)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// schemas

pub async fn find_schema_by_hash(
    conn: &mut SqliteConnection,
    hash: &str,
    schema_type: &str,
) -> RegistryResult<Option<SchemaRow>> {
    let row = sqlx::query_as::<_, SchemaRow>(
        "SELECT * FROM schemas WHERE hash = ? AND schema_type = ?",
    )
    .bind(hash)
    .bind(schema_type)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

pub async fn find_schema_by_row_id(
    conn: &mut SqliteConnection,
    schema_id: &str,
) -> RegistryResult<Option<SchemaRow>> {
    let row = sqlx::query_as::<_, SchemaRow>("SELECT * FROM schemas WHERE id = ?")
        .bind(schema_id)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

pub async fn insert_schema(conn: &mut SqliteConnection, schema: &SchemaRow) -> RegistryResult<()> {
    sqlx::query(
        r#"
        INSERT INTO schemas (id, global_id, body, hash, schema_type, created_at, updated_at, deleted_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, NULL)
        "#,
    )
    .bind(&schema.id)
    .bind(schema.global_id)
    .bind(&schema.body)
    .bind(&schema.hash)
    .bind(&schema.schema_type)
    .bind(schema.created_at)
    .bind(schema.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// subject versions

pub async fn find_version_by_subject_and_schema(
    conn: &mut SqliteConnection,
    subject_id: &str,
    schema_id: &str,
) -> RegistryResult<Option<SubjectVersionRow>> {
    let row = sqlx::query_as::<_, SubjectVersionRow>(
        r#"
        SELECT * FROM subject_versions
        WHERE subject_id = ? AND schema_id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(subject_id)
    .bind(schema_id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

/// Latest version for a subject, soft-deleted rows included
///
/// Version numbering continues past soft deletion, so this is the row that
/// decides the next version number and the subject's schema type.
pub async fn latest_version_any(
    conn: &mut SqliteConnection,
    subject_id: &str,
) -> RegistryResult<Option<SubjectVersionRow>> {
    let row = sqlx::query_as::<_, SubjectVersionRow>(
        r#"
        SELECT * FROM subject_versions
        WHERE subject_id = ?
        ORDER BY version DESC
        LIMIT 1
        "#,
    )
    .bind(subject_id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

pub async fn find_version_by_number(
    conn: &mut SqliteConnection,
    subject_id: &str,
    version: i32,
    include_deleted: bool,
) -> RegistryResult<Option<SubjectVersionRow>> {
    let sql = if include_deleted {
        "SELECT * FROM subject_versions WHERE subject_id = ? AND version = ?"
    } else {
        "SELECT * FROM subject_versions WHERE subject_id = ? AND version = ? AND deleted_at IS NULL"
    };

    let row = sqlx::query_as::<_, SubjectVersionRow>(sql)
        .bind(subject_id)
        .bind(version)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

pub async fn latest_live_version(
    conn: &mut SqliteConnection,
    subject_id: &str,
) -> RegistryResult<Option<SubjectVersionRow>> {
    let row = sqlx::query_as::<_, SubjectVersionRow>(
        r#"
        SELECT * FROM subject_versions
        WHERE subject_id = ? AND deleted_at IS NULL
        ORDER BY version DESC
        LIMIT 1
        "#,
    )
    .bind(subject_id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

pub async fn insert_subject_version(
    conn: &mut SqliteConnection,
    version: &SubjectVersionRow,
) -> RegistryResult<()> {
    sqlx::query(
        r#"
        INSERT INTO subject_versions (id, subject_id, schema_id, version, created_at, deleted_at)
        VALUES (?, ?, ?, ?, ?, NULL)
        "#,
    )
    .bind(&version.id)
    .bind(&version.subject_id)
    .bind(&version.schema_id)
    .bind(version.version)
    .bind(version.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Version numbers for a subject, ascending; the subject itself must be live
pub async fn list_version_numbers(
    conn: &mut SqliteConnection,
    subject_name: &str,
    include_deleted: bool,
) -> RegistryResult<Vec<i32>> {
    let sql = if include_deleted {
        r#"
        SELECT sv.version FROM subject_versions sv
        JOIN subjects s ON s.id = sv.subject_id
        WHERE s.name = ? AND s.deleted_at IS NULL
        ORDER BY sv.version ASC
        "#
    } else {
        r#"
        SELECT sv.version FROM subject_versions sv
        JOIN subjects s ON s.id = sv.subject_id
        WHERE s.name = ? AND s.deleted_at IS NULL AND sv.deleted_at IS NULL
        ORDER BY sv.version ASC
        "#
    };

    let rows: Vec<(i32,)> = sqlx::query_as(sql).bind(subject_name).fetch_all(conn).await?;
    Ok(rows.into_iter().map(|(v,)| v).collect())
}

/// Live versions of a subject joined with their schemas, newest first
pub async fn live_versions_with_schemas_desc(
    conn: &mut SqliteConnection,
    subject_id: &str,
    limit: Option<i64>,
) -> RegistryResult<Vec<VersionSchemaRow>> {
    let sql = r#"
        SELECT sv.id AS version_id, sv.subject_id, sv.schema_id, sv.version,
               s.global_id, s.body, s.schema_type
        FROM subject_versions sv
        JOIN schemas s ON s.id = sv.schema_id
        WHERE sv.subject_id = ? AND sv.deleted_at IS NULL
        ORDER BY sv.version DESC
        LIMIT ?
    "#;

    let rows = sqlx::query_as::<_, VersionSchemaRow>(sql)
        .bind(subject_id)
        .bind(limit.unwrap_or(-1))
        .fetch_all(conn)
        .await?;
    Ok(rows)
}

/// Load one subject version joined with subject and schema by name and number
pub async fn find_version_with_schema(
    conn: &mut SqliteConnection,
    subject_name: &str,
    version: i32,
) -> RegistryResult<Option<VersionSchemaRow>> {
    let row = sqlx::query_as::<_, VersionSchemaRow>(
        r#"
        SELECT sv.id AS version_id, sv.subject_id, sv.schema_id, sv.version,
               s.global_id, s.body, s.schema_type
        FROM subject_versions sv
        JOIN subjects sub ON sub.id = sv.subject_id
        JOIN schemas s ON s.id = sv.schema_id
        WHERE sub.name = ? AND sub.deleted_at IS NULL
          AND sv.version = ? AND sv.deleted_at IS NULL
        "#,
    )
    .bind(subject_name)
    .bind(version)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

/// Soft-delete all live versions of a subject, returning their numbers
pub async fn soft_delete_versions_for_subject(
    conn: &mut SqliteConnection,
    subject_id: &str,
) -> RegistryResult<Vec<i32>> {
    let rows: Vec<(i32,)> = sqlx::query_as(
        r#"
        UPDATE subject_versions SET deleted_at = ?
        WHERE subject_id = ? AND deleted_at IS NULL
        RETURNING version
        "#,
    )
    .bind(Utc::now())
    .bind(subject_id)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(|(v,)| v).collect())
}

/// Hard-delete all versions of a subject (soft-deleted included), returning
/// their numbers
pub async fn hard_delete_versions_for_subject(
    conn: &mut SqliteConnection,
    subject_id: &str,
) -> RegistryResult<Vec<i32>> {
    let rows: Vec<(i32,)> = sqlx::query_as(
        "DELETE FROM subject_versions WHERE subject_id = ? RETURNING version",
    )
    .bind(subject_id)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(|(v,)| v).collect())
}

pub async fn soft_delete_version(
    conn: &mut SqliteConnection,
    version_id: &str,
) -> RegistryResult<()> {
    sqlx::query("UPDATE subject_versions SET deleted_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(version_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn hard_delete_version(
    conn: &mut SqliteConnection,
    version_id: &str,
) -> RegistryResult<()> {
    sqlx::query("DELETE FROM subject_versions WHERE id = ?")
        .bind(version_id)
        .execute(conn)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// schema references

pub async fn insert_schema_reference(
    conn: &mut SqliteConnection,
    reference: &SchemaReferenceRow,
) -> RegistryResult<()> {
    sqlx::query(
        r#"
        INSERT INTO schema_references (id, schema_id, subject_version_id, name, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&reference.id)
    .bind(&reference.schema_id)
    .bind(&reference.subject_version_id)
    .bind(&reference.name)
    .bind(reference.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// The reference edges of a schema, each joined with its target version and
/// that version's schema
pub async fn references_of_schema(
    conn: &mut SqliteConnection,
    schema_id: &str,
) -> RegistryResult<Vec<ReferenceTargetRow>> {
    let rows = sqlx::query_as::<_, ReferenceTargetRow>(
        r#"
        SELECT r.name, sv.id AS version_id, sv.subject_id, sv.schema_id, sv.version,
               s.global_id, s.body, s.schema_type
        FROM schema_references r
        JOIN subject_versions sv ON sv.id = r.subject_version_id
        JOIN schemas s ON s.id = sv.schema_id
        WHERE r.schema_id = ?
        ORDER BY r.name ASC
        "#,
    )
    .bind(schema_id)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Global ids of schemas whose references point at this subject version
pub async fn referencing_global_ids(
    conn: &mut SqliteConnection,
    subject_version_id: &str,
) -> RegistryResult<Vec<i32>> {
    let rows: Vec<(i32,)> = sqlx::query_as(
        r#"
        SELECT s.global_id
        FROM schema_references r
        JOIN schemas s ON s.id = r.schema_id
        WHERE r.subject_version_id = ?
        ORDER BY s.global_id ASC
        "#,
    )
    .bind(subject_version_id)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Load one subject version joined with subject and schema by `(name, version)`
/// for reference resolution; soft-deleted rows are not eligible targets
pub async fn find_reference_target(
    conn: &mut SqliteConnection,
    subject_name: &str,
    version: i32,
) -> RegistryResult<Option<VersionSchemaRow>> {
    find_version_with_schema(conn, subject_name, version).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Store;

    fn subject(name: &str) -> SubjectRow {
        let now = Utc::now();
        SubjectRow {
            id: new_row_id(),
            name: name.to_string(),
            compatibility: "BACKWARD".to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn schema(global_id: i32, hash: &str) -> SchemaRow {
        let now = Utc::now();
        SchemaRow {
            id: new_row_id(),
            global_id,
            body: "{\"type\":\"string\"}".to_string(),
            hash: hash.to_string(),
            schema_type: "AVRO".to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn test_subject_round_trip_and_soft_delete() {
        let store = Store::connect_in_memory().await.unwrap();
        let mut conn = store.pool().acquire().await.unwrap();

        let row = subject("topic-value");
        insert_subject(&mut conn, &row).await.unwrap();

        let found = find_subject_by_name(&mut conn, "topic-value", false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, row.id);
        assert_eq!(found.compatibility, "BACKWARD");

        soft_delete_subject(&mut conn, &row.id).await.unwrap();
        assert!(find_subject_by_name(&mut conn, "topic-value", false)
            .await
            .unwrap()
            .is_none());
        let deleted = find_subject_by_name(&mut conn, "topic-value", true)
            .await
            .unwrap()
            .unwrap();
        assert!(deleted.deleted_at.is_some());

        undelete_subject(&mut conn, &row.id).await.unwrap();
        assert!(find_subject_by_name(&mut conn, "topic-value", false)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_version_numbering_queries_include_soft_deleted() {
        let store = Store::connect_in_memory().await.unwrap();
        let mut conn = store.pool().acquire().await.unwrap();

        let sub = subject("numbers");
        insert_subject(&mut conn, &sub).await.unwrap();
        let sch = schema(1, "h1");
        insert_schema(&mut conn, &sch).await.unwrap();

        for version in 1..=3 {
            let row = SubjectVersionRow {
                id: new_row_id(),
                subject_id: sub.id.clone(),
                schema_id: sch.id.clone(),
                version,
                created_at: Utc::now(),
                deleted_at: None,
            };
            insert_subject_version(&mut conn, &row).await.unwrap();
        }

        let versions = soft_delete_versions_for_subject(&mut conn, &sub.id)
            .await
            .unwrap();
        assert_eq!(versions, vec![1, 2, 3]);

        // soft-deleted rows still drive numbering
        let latest = latest_version_any(&mut conn, &sub.id).await.unwrap().unwrap();
        assert_eq!(latest.version, 3);
        assert!(latest.deleted_at.is_some());

        assert!(latest_live_version(&mut conn, &sub.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_schema_dedup_index_is_per_hash_and_type() {
        let store = Store::connect_in_memory().await.unwrap();
        let mut conn = store.pool().acquire().await.unwrap();

        let first = schema(1, "same-hash");
        insert_schema(&mut conn, &first).await.unwrap();

        let mut clash = schema(2, "same-hash");
        clash.schema_type = "JSON".to_string();
        // same hash, different type: allowed
        insert_schema(&mut conn, &clash).await.unwrap();

        let dupe = schema(3, "same-hash");
        // same hash and type: rejected by the unique index
        assert!(insert_schema(&mut conn, &dupe).await.is_err());
    }
}
