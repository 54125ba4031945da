//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Wire request types

use std::str::FromStr;

use serde::Deserialize;

use crate::error::RegistryResult;
use crate::registry::{RegisterRequest, SchemaReference};
use crate::schema::SchemaType;

/// Body of `POST /subjects/{subject}/versions` and `POST /subjects/{subject}`
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaBody {
    /// Raw schema text
    #[serde(default)]
    pub schema: String,

    /// Schema type tag; absent or empty means AVRO
    #[serde(rename = "schemaType", default)]
    pub schema_type: Option<String>,

    /// References to other subjects' versions
    #[serde(default)]
    pub references: Vec<SchemaReference>,
}

impl SchemaBody {
    /// Decode into a registry request, resolving the type tag
    pub fn into_register_request(self) -> RegistryResult<RegisterRequest> {
        let schema_type = match self.schema_type.as_deref() {
            None | Some("") => SchemaType::Avro,
            Some(raw) => SchemaType::from_str(raw)?,
        };

        Ok(RegisterRequest {
            body: self.schema,
            schema_type,
            references: self.references,
        })
    }
}

/// `?deleted=` query flag
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeletedQuery {
    pub deleted: Option<String>,
}

/// `?permanent=` query flag
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PermanentQuery {
    pub permanent: Option<String>,
}

/// Boolean query parameters accept `true`/`false` case-insensitively;
/// anything else is false
pub fn parse_flag(raw: Option<&str>) -> bool {
    raw.map(|value| value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;

    #[test]
    fn test_flag_parsing() {
        assert!(parse_flag(Some("true")));
        assert!(parse_flag(Some("TRUE")));
        assert!(parse_flag(Some("True")));
        assert!(!parse_flag(Some("false")));
        assert!(!parse_flag(Some("yes")));
        assert!(!parse_flag(Some("1")));
        assert!(!parse_flag(None));
    }

    #[test]
    fn test_schema_type_defaults_to_avro() {
        let body: SchemaBody = serde_json::from_str(r#"{"schema": "{}"}"#).unwrap();
        let request = body.into_register_request().unwrap();
        assert_eq!(request.schema_type, SchemaType::Avro);
        assert!(request.references.is_empty());
    }

    #[test]
    fn test_unknown_schema_type_is_rejected() {
        let body: SchemaBody =
            serde_json::from_str(r#"{"schema": "{}", "schemaType": "THRIFT"}"#).unwrap();
        assert!(matches!(
            body.into_register_request(),
            Err(RegistryError::UnknownSchemaType { .. })
        ));
    }

    #[test]
    fn test_references_deserialize() {
        let body: SchemaBody = serde_json::from_str(
            r#"{"schema": "{}", "references": [{"name": "n", "subject": "s", "version": 2}]}"#,
        )
        .unwrap();
        assert_eq!(body.references.len(), 1);
        assert_eq!(body.references[0].subject, "s");
        assert_eq!(body.references[0].version, 2);
    }
}
