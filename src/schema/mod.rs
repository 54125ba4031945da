//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Schema parsing and compatibility
//!
//! A raw schema body plus its resolved references parse into a
//! [`ParsedSchema`], the capability the registration pipeline uses for
//! compatibility checking. Parsers reject schemas that re-define any
//! referenced named type.

pub mod avro;
pub mod json;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, RegistryResult};

pub use avro::ParsedAvroSchema;
pub use json::ParsedJsonSchema;

/// Supported schema declaration formats
///
/// `Protobuf` is reserved in the wire enum; parsing it always fails until it
/// is implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaType {
    #[serde(rename = "AVRO")]
    Avro,
    #[serde(rename = "JSON")]
    Json,
    #[serde(rename = "PROTOBUF")]
    Protobuf,
}

impl SchemaType {
    /// Canonical wire spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Avro => "AVRO",
            Self::Json => "JSON",
            Self::Protobuf => "PROTOBUF",
        }
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaType {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVRO" => Ok(Self::Avro),
            "JSON" => Ok(Self::Json),
            "PROTOBUF" => Ok(Self::Protobuf),
            other => Err(RegistryError::UnknownSchemaType {
                given: other.to_string(),
            }),
        }
    }
}

/// A parsed, reference-resolved schema
#[derive(Debug)]
pub enum ParsedSchema {
    Avro(ParsedAvroSchema),
    Json(ParsedJsonSchema),
}

/// Parse a schema body against its already-resolved references
///
/// `references` holds `(name, body)` pairs in resolution order, leaves
/// before roots. Parse failures surface as `InvalidSchema`.
pub fn parse(
    body: &str,
    schema_type: SchemaType,
    references: &[(String, String)],
) -> RegistryResult<ParsedSchema> {
    match schema_type {
        SchemaType::Avro => Ok(ParsedSchema::Avro(ParsedAvroSchema::parse(body, references)?)),
        SchemaType::Json => Ok(ParsedSchema::Json(ParsedJsonSchema::parse(body, references)?)),
        SchemaType::Protobuf => Err(RegistryError::UnknownSchemaType {
            given: SchemaType::Protobuf.to_string(),
        }),
    }
}

impl ParsedSchema {
    /// Whether this schema (the writer) is backward compatible with a
    /// previously registered one (the reader)
    ///
    /// Comparing schemas of different variants is a logic error in the
    /// pipeline, not a verdict, and maps to `InternalError`.
    pub fn is_backward_compatible_with(&self, previous: &ParsedSchema) -> RegistryResult<bool> {
        match (self, previous) {
            (Self::Avro(new), Self::Avro(old)) => Ok(new.is_backward_compatible_with(old)),
            (Self::Json(new), Self::Json(old)) => Ok(new.is_backward_compatible_with(old)),
            _ => Err(RegistryError::internal(
                "cannot check compatibility across schema types",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_type_round_trip() {
        for (text, variant) in [
            ("AVRO", SchemaType::Avro),
            ("JSON", SchemaType::Json),
            ("PROTOBUF", SchemaType::Protobuf),
        ] {
            assert_eq!(text.parse::<SchemaType>().unwrap(), variant);
            assert_eq!(variant.as_str(), text);
        }
        assert!(matches!(
            "THRIFT".parse::<SchemaType>(),
            Err(RegistryError::UnknownSchemaType { .. })
        ));
    }

    #[test]
    fn test_protobuf_parsing_is_reserved() {
        let err = parse("syntax = \"proto3\";", SchemaType::Protobuf, &[]).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownSchemaType { .. }));
    }

    #[test]
    fn test_cross_variant_compatibility_is_a_logic_error() {
        let avro = parse(r#"{"type": "string"}"#, SchemaType::Avro, &[]).unwrap();
        let json = parse(r#"{"type": "string"}"#, SchemaType::Json, &[]).unwrap();
        assert!(matches!(
            avro.is_backward_compatible_with(&json),
            Err(RegistryError::Internal { .. })
        ));
    }
}
