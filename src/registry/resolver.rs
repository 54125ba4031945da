//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Reference resolution
//!
//! Resolving a reference loads its target subject version and recursively
//! gathers the target schema's own references, leaves before roots, so the
//! parser sees every named type a schema depends on. The recursion is
//! depth-capped: long chains multiply database fan-out and parse time.

use std::future::Future;
use std::pin::Pin;

use sqlx::SqliteConnection;

use crate::error::{RegistryError, RegistryResult};
use crate::schema::SchemaType;
use crate::storage::models;

/// Maximum reference chain depth accepted at registration time
pub const MAX_REFERENCE_DEPTH: i32 = 5;

/// One resolved reference: the name the referring schema uses, the target
/// version row, and the target's raw body for the parser
#[derive(Debug, Clone)]
pub struct ResolvedReference {
    pub name: String,
    pub version_id: String,
    pub body: String,
}

type BoxFut<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Resolve one request reference against live subject versions
///
/// The direct target is appended last so depth-first order yields leaves
/// before roots. This call is depth 0; collecting the target's own
/// references starts at 1.
pub async fn resolve_reference(
    conn: &mut SqliteConnection,
    name: &str,
    subject: &str,
    version: i32,
    expected_type: SchemaType,
) -> RegistryResult<Vec<ResolvedReference>> {
    let target = models::find_reference_target(&mut *conn, subject, version)
        .await?
        .ok_or_else(|| RegistryError::ReferenceNotFound {
            subject: subject.to_string(),
            version,
        })?;

    if target.schema_type != expected_type.as_str() {
        return Err(RegistryError::ReferenceTypeMismatch);
    }

    let mut resolved = collect_references(conn, target.schema_id.clone(), 1).await?;
    resolved.push(ResolvedReference {
        name: name.to_string(),
        version_id: target.version_id,
        body: target.body,
    });
    Ok(resolved)
}

/// Recursively gather the reference closure of a stored schema
///
/// The compatibility pre-pass enters at depth 0: schemas already in the
/// registry were bounded when they were accepted, so they get one extra hop
/// of slack over fresh registrations.
pub fn collect_references(
    conn: &mut SqliteConnection,
    schema_id: String,
    depth: i32,
) -> BoxFut<'_, RegistryResult<Vec<ResolvedReference>>> {
    Box::pin(async move {
        if depth >= MAX_REFERENCE_DEPTH {
            return Err(RegistryError::ReferenceChainTooDeep);
        }

        let edges = models::references_of_schema(&mut *conn, &schema_id).await?;

        let mut resolved = Vec::new();
        for edge in edges {
            let nested = collect_references(&mut *conn, edge.schema_id.clone(), depth + 1).await?;
            resolved.extend(nested);
            resolved.push(ResolvedReference {
                name: edge.name,
                version_id: edge.version_id,
                body: edge.body,
            });
        }

        Ok(resolved)
    })
}

/// Fold resolved references into parser input, later duplicates overwriting
/// earlier ones in place
pub fn upsert_parse_input(inputs: &mut Vec<(String, String)>, name: &str, body: &str) {
    match inputs.iter_mut().find(|(existing, _)| existing == name) {
        Some(entry) => entry.1 = body.to_string(),
        None => inputs.push((name.to_string(), body.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_parse_input_overwrites_by_name() {
        let mut inputs = Vec::new();
        upsert_parse_input(&mut inputs, "a", "one");
        upsert_parse_input(&mut inputs, "b", "two");
        upsert_parse_input(&mut inputs, "a", "three");
        assert_eq!(
            inputs,
            vec![
                ("a".to_string(), "three".to_string()),
                ("b".to_string(), "two".to_string()),
            ]
        );
    }
}
