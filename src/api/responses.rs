//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Wire response types

use serde::Serialize;

use crate::registry::{SchemaLookupView, SubjectVersionView};
use crate::schema::SchemaType;

/// Response of `POST /subjects/{subject}/versions`
#[derive(Debug, Clone, Serialize)]
pub struct RegisterSchemaResponse {
    pub id: i32,
}

/// Response of `GET /subjects/{subject}/versions/{version}`
///
/// `schemaType` is omitted for AVRO, which older clients expect.
#[derive(Debug, Clone, Serialize)]
pub struct SubjectVersionResponse {
    pub subject: String,
    pub id: i32,
    pub version: i32,
    #[serde(rename = "schemaType", skip_serializing_if = "String::is_empty")]
    pub schema_type: String,
    pub schema: String,
}

impl From<SubjectVersionView> for SubjectVersionResponse {
    fn from(view: SubjectVersionView) -> Self {
        let schema_type = match view.schema_type {
            SchemaType::Avro => String::new(),
            other => other.to_string(),
        };
        Self {
            subject: view.subject,
            id: view.global_id,
            version: view.version,
            schema_type,
            schema: view.body,
        }
    }
}

/// Response of `POST /subjects/{subject}` (exact-match lookup)
#[derive(Debug, Clone, Serialize)]
pub struct SchemaLookupResponse {
    pub subject: String,
    pub id: i32,
    pub version: i32,
    pub schema: String,
}

impl From<SchemaLookupView> for SchemaLookupResponse {
    fn from(view: SchemaLookupView) -> Self {
        Self {
            subject: view.subject,
            id: view.global_id,
            version: view.version,
            schema: view.body,
        }
    }
}

/// Response of `GET /health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_avro_schema_type_is_omitted() {
        let response = SubjectVersionResponse {
            subject: "s".to_string(),
            id: 1,
            version: 1,
            schema_type: String::new(),
            schema: "{}".to_string(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("schemaType"));
    }

    #[test]
    fn test_json_schema_type_is_reported() {
        let view = SubjectVersionView {
            subject: "s".to_string(),
            global_id: 1,
            version: 1,
            schema_type: SchemaType::Json,
            body: "{}".to_string(),
        };
        let response = SubjectVersionResponse::from(view);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["schemaType"], "JSON");
    }
}
