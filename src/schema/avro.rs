//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Avro schema parsing and compatibility
//!
//! Compatibility follows the Avro schema-resolution model with the writer
//! being the new schema and the reader the existing one. Named back-edges
//! stay as `Ref` nodes and compare by fullname, so cyclic schemas terminate
//! without a visited set. Field and union ordering changes are not detected.

use std::collections::HashSet;

use apache_avro::schema::{EnumSchema, Name, RecordSchema, Schema as AvroSchema, UnionSchema};

use crate::error::{RegistryError, RegistryResult};

/// A parsed Avro schema declaration
#[derive(Debug)]
pub struct ParsedAvroSchema {
    schema: AvroSchema,
}

impl ParsedAvroSchema {
    /// Parse `body` with its references in scope
    ///
    /// References parse first into the shared name space; the body may then
    /// use their named types but must not re-define them.
    pub fn parse(body: &str, references: &[(String, String)]) -> RegistryResult<ParsedAvroSchema> {
        let mut inputs: Vec<&str> = references.iter().map(|(_, raw)| raw.as_str()).collect();
        inputs.push(body);

        let mut parsed = AvroSchema::parse_list(&inputs)
            .map_err(|e| RegistryError::invalid_schema(e.to_string()))?;

        let schema = parsed
            .pop()
            .ok_or_else(|| RegistryError::internal("avro parser returned no schemas"))?;

        let mut reference_names = HashSet::new();
        for reference in &parsed {
            collect_named_types(reference, &mut reference_names);
        }

        if let Some(name) = find_redefined_name(&schema, &reference_names) {
            return Err(RegistryError::invalid_schema(format!(
                "can't redefine: {name}"
            )));
        }

        Ok(ParsedAvroSchema { schema })
    }

    /// Whether this schema (writer) is backward compatible with `previous`
    /// (reader)
    pub fn is_backward_compatible_with(&self, previous: &ParsedAvroSchema) -> bool {
        resolves(&self.schema, &previous.schema)
    }
}

/// Fullname of a named schema node
fn fullname(name: &Name) -> String {
    match name.namespace.as_deref() {
        Some(ns) if !ns.is_empty() => format!("{}.{}", ns, name.name),
        _ => name.name.clone(),
    }
}

/// Record every named type defined (not merely referenced) in `schema`
fn collect_named_types(schema: &AvroSchema, names: &mut HashSet<String>) {
    match schema {
        AvroSchema::Record(record) => {
            names.insert(fullname(&record.name));
            for field in &record.fields {
                collect_named_types(&field.schema, names);
            }
        }
        AvroSchema::Enum(inner) => {
            names.insert(fullname(&inner.name));
        }
        AvroSchema::Fixed(inner) => {
            names.insert(fullname(&inner.name));
        }
        AvroSchema::Array(inner) => collect_named_types(&inner.items, names),
        AvroSchema::Map(inner) => collect_named_types(&inner.types, names),
        AvroSchema::Union(union) => {
            for variant in union.variants() {
                collect_named_types(variant, names);
            }
        }
        _ => {}
    }
}

/// First named type the schema defines whose fullname a reference already
/// claims; references themselves stay `Ref` nodes and never trip this
fn find_redefined_name(schema: &AvroSchema, claimed: &HashSet<String>) -> Option<String> {
    match schema {
        AvroSchema::Record(record) => {
            let name = fullname(&record.name);
            if claimed.contains(&name) {
                return Some(name);
            }
            record
                .fields
                .iter()
                .find_map(|field| find_redefined_name(&field.schema, claimed))
        }
        AvroSchema::Enum(inner) => {
            let name = fullname(&inner.name);
            claimed.contains(&name).then_some(name)
        }
        AvroSchema::Fixed(inner) => {
            let name = fullname(&inner.name);
            claimed.contains(&name).then_some(name)
        }
        AvroSchema::Array(inner) => find_redefined_name(&inner.items, claimed),
        AvroSchema::Map(inner) => find_redefined_name(&inner.types, claimed),
        AvroSchema::Union(union) => union
            .variants()
            .iter()
            .find_map(|variant| find_redefined_name(variant, claimed)),
        _ => None,
    }
}

/// Schema-resolution compatibility: can data written with `writer` be
/// resolved by `reader`
fn resolves(writer: &AvroSchema, reader: &AvroSchema) -> bool {
    // writer is not a union but the reader is: the first reader branch of
    // the writer's kind is recursively resolved
    if !matches!(writer, AvroSchema::Union(_)) {
        if let AvroSchema::Union(reader_union) = reader {
            for branch in reader_union.variants() {
                if same_kind(writer, branch) {
                    return resolves(writer, branch);
                }
            }
            return false;
        }
    }

    match writer {
        AvroSchema::Null => matches!(reader, AvroSchema::Null),
        AvroSchema::Boolean => matches!(reader, AvroSchema::Boolean),
        AvroSchema::Int => matches!(
            reader,
            AvroSchema::Int | AvroSchema::Long | AvroSchema::Float | AvroSchema::Double
        ),
        AvroSchema::Long => matches!(
            reader,
            AvroSchema::Long | AvroSchema::Float | AvroSchema::Double
        ),
        AvroSchema::Float => matches!(reader, AvroSchema::Float | AvroSchema::Double),
        AvroSchema::Double => matches!(reader, AvroSchema::Double),
        AvroSchema::Bytes => matches!(reader, AvroSchema::Bytes | AvroSchema::String),
        AvroSchema::String => matches!(reader, AvroSchema::String | AvroSchema::Bytes),
        AvroSchema::Record(writer_record) => match reader {
            AvroSchema::Record(reader_record) => record_resolves(writer_record, reader_record),
            _ => false,
        },
        AvroSchema::Enum(writer_enum) => match reader {
            AvroSchema::Enum(reader_enum) => enum_resolves(writer_enum, reader_enum),
            _ => false,
        },
        AvroSchema::Array(writer_array) => match reader {
            AvroSchema::Array(reader_array) => resolves(&writer_array.items, &reader_array.items),
            _ => false,
        },
        AvroSchema::Map(writer_map) => match reader {
            AvroSchema::Map(reader_map) => resolves(&writer_map.types, &reader_map.types),
            _ => false,
        },
        AvroSchema::Union(writer_union) => match reader {
            AvroSchema::Union(reader_union) => union_resolves(writer_union, reader_union),
            _ => false,
        },
        AvroSchema::Fixed(writer_fixed) => match reader {
            AvroSchema::Fixed(reader_fixed) => {
                fullname(&writer_fixed.name) == fullname(&reader_fixed.name)
                    && writer_fixed.size == reader_fixed.size
            }
            _ => false,
        },
        AvroSchema::Ref { name: writer_name } => match reader {
            AvroSchema::Ref { name: reader_name } => {
                fullname(writer_name) == fullname(reader_name)
            }
            _ => false,
        },
        // logical and extension types resolve only against themselves
        other => std::mem::discriminant(other) == std::mem::discriminant(reader),
    }
}

fn same_kind(a: &AvroSchema, b: &AvroSchema) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

/// Every reader field must be supplied by a same-named writer field or carry
/// a default; writer-only fields are allowed
fn record_resolves(writer: &RecordSchema, reader: &RecordSchema) -> bool {
    if fullname(&writer.name) != fullname(&reader.name) {
        return false;
    }

    for reader_field in &reader.fields {
        let written = writer
            .fields
            .iter()
            .find(|writer_field| writer_field.name == reader_field.name);

        match written {
            Some(writer_field) => {
                if !resolves(&writer_field.schema, &reader_field.schema) {
                    return false;
                }
            }
            None => {
                if reader_field.default.is_none() {
                    return false;
                }
            }
        }
    }

    true
}

/// Every writer symbol must appear in the reader unless the reader declares
/// a default symbol
fn enum_resolves(writer: &EnumSchema, reader: &EnumSchema) -> bool {
    for symbol in &writer.symbols {
        if !reader.symbols.contains(symbol) && reader.default.is_none() {
            return false;
        }
    }
    true
}

/// Union against union: every reader branch needs some resolution-compatible
/// writer branch
fn union_resolves(writer: &UnionSchema, reader: &UnionSchema) -> bool {
    reader.variants().iter().all(|reader_branch| {
        writer
            .variants()
            .iter()
            .any(|writer_branch| resolves(writer_branch, reader_branch))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> ParsedAvroSchema {
        ParsedAvroSchema::parse(body, &[]).unwrap()
    }

    fn compatible(new: &str, old: &str) -> bool {
        parse(new).is_backward_compatible_with(&parse(old))
    }

    const RECORD_ONE_FIELD: &str = r#"
    {"type": "record", "name": "R", "fields": [{"name": "f1", "type": "long"}]}
    "#;

    const RECORD_TWO_FIELDS: &str = r#"
    {"type": "record", "name": "R", "fields": [
        {"name": "f1", "type": "long"},
        {"name": "f2", "type": "string"}
    ]}
    "#;

    #[test]
    fn test_identical_records_are_compatible() {
        assert!(compatible(RECORD_ONE_FIELD, RECORD_ONE_FIELD));
    }

    #[test]
    fn test_added_field_is_backward_compatible() {
        assert!(compatible(RECORD_TWO_FIELDS, RECORD_ONE_FIELD));
    }

    #[test]
    fn test_dropping_required_field_is_incompatible() {
        let new = r#"{"type": "record", "name": "R", "fields": [{"name": "f2", "type": "string"}]}"#;
        assert!(!compatible(new, RECORD_ONE_FIELD));
    }

    #[test]
    fn test_dropping_defaulted_field_is_compatible() {
        let old = r#"
        {"type": "record", "name": "R", "fields": [
            {"name": "f1", "type": "long"},
            {"name": "f2", "type": "string", "default": "x"}
        ]}
        "#;
        let new = r#"{"type": "record", "name": "R", "fields": [{"name": "f1", "type": "long"}]}"#;
        assert!(compatible(new, old));
    }

    #[test]
    fn test_record_name_must_match() {
        let other = r#"{"type": "record", "name": "S", "fields": [{"name": "f1", "type": "long"}]}"#;
        assert!(!compatible(other, RECORD_ONE_FIELD));
    }

    #[test]
    fn test_primitive_promotions() {
        assert!(compatible(r#"{"type": "int"}"#, r#"{"type": "long"}"#));
        assert!(compatible(r#"{"type": "int"}"#, r#"{"type": "double"}"#));
        assert!(compatible(r#"{"type": "long"}"#, r#"{"type": "float"}"#));
        assert!(compatible(r#"{"type": "float"}"#, r#"{"type": "double"}"#));
        assert!(compatible(r#"{"type": "string"}"#, r#"{"type": "bytes"}"#));
        assert!(compatible(r#"{"type": "bytes"}"#, r#"{"type": "string"}"#));

        assert!(!compatible(r#"{"type": "long"}"#, r#"{"type": "int"}"#));
        assert!(!compatible(r#"{"type": "double"}"#, r#"{"type": "float"}"#));
        assert!(!compatible(r#"{"type": "string"}"#, r#"{"type": "int"}"#));
    }

    #[test]
    fn test_writer_into_reader_union_takes_first_matching_branch() {
        let old = r#"["null", "int"]"#;
        assert!(compatible(r#"{"type": "int"}"#, old));
        assert!(!compatible(r#"{"type": "string"}"#, old));
    }

    #[test]
    fn test_union_against_union() {
        // every old branch is covered by some new branch
        assert!(compatible(r#"["null", "int", "string"]"#, r#"["null", "int"]"#));
        // old branch "string" has no compatible new branch
        assert!(!compatible(r#"["null", "int"]"#, r#"["null", "string"]"#));
    }

    #[test]
    fn test_enum_symbols() {
        let old = r#"{"type": "enum", "name": "E", "symbols": ["A", "B", "C"]}"#;
        let narrowed = r#"{"type": "enum", "name": "E", "symbols": ["A", "B"]}"#;
        let widened = r#"{"type": "enum", "name": "E", "symbols": ["A", "B", "C", "D"]}"#;
        let defaulted = r#"{"type": "enum", "name": "E", "symbols": ["A", "B"], "default": "A"}"#;

        // fewer writer symbols always resolve
        assert!(compatible(narrowed, old));
        // a new writer symbol needs a reader default
        assert!(!compatible(widened, old));
        assert!(compatible(old, defaulted));
    }

    #[test]
    fn test_enum_against_non_enum_is_incompatible() {
        let e = r#"{"type": "enum", "name": "E", "symbols": ["A"]}"#;
        assert!(!compatible(e, r#"{"type": "string"}"#));
    }

    #[test]
    fn test_fixed_requires_same_name_and_size() {
        let old = r#"{"type": "fixed", "name": "F", "size": 16}"#;
        assert!(compatible(r#"{"type": "fixed", "name": "F", "size": 16}"#, old));
        assert!(!compatible(r#"{"type": "fixed", "name": "F", "size": 8}"#, old));
        assert!(!compatible(r#"{"type": "fixed", "name": "G", "size": 16}"#, old));
    }

    #[test]
    fn test_arrays_and_maps_recurse() {
        assert!(compatible(
            r#"{"type": "array", "items": "int"}"#,
            r#"{"type": "array", "items": "long"}"#
        ));
        assert!(!compatible(
            r#"{"type": "array", "items": "string"}"#,
            r#"{"type": "array", "items": "int"}"#
        ));
        assert!(compatible(
            r#"{"type": "map", "values": "int"}"#,
            r#"{"type": "map", "values": "double"}"#
        ));
    }

    #[test]
    fn test_parse_with_reference() {
        let reference = (
            "schema_one".to_string(),
            RECORD_ONE_FIELD.to_string(),
        );
        let body = r#"
        {"type": "record", "name": "Wrapper", "fields": [{"name": "inner", "type": "R"}]}
        "#;
        assert!(ParsedAvroSchema::parse(body, &[reference]).is_ok());
    }

    #[test]
    fn test_redefining_a_referenced_type_fails() {
        let reference = ("schema_one".to_string(), RECORD_ONE_FIELD.to_string());
        let body = r#"
        {"type": "record", "name": "R", "fields": [{"name": "f1", "type": "long"}]}
        "#;
        let err = ParsedAvroSchema::parse(body, &[reference]).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidSchema { .. }));
    }

    #[test]
    fn test_references_compare_by_fullname() {
        let ref_a = ("a".to_string(), RECORD_ONE_FIELD.to_string());
        let body = r#"
        {"type": "record", "name": "Wrapper", "fields": [{"name": "inner", "type": "R"}]}
        "#;
        let new = ParsedAvroSchema::parse(body, &[ref_a.clone()]).unwrap();
        let old = ParsedAvroSchema::parse(body, &[ref_a]).unwrap();
        assert!(new.is_backward_compatible_with(&old));
    }

    #[test]
    fn test_recursive_record_parses_and_is_self_compatible() {
        let body = r#"
        {"type": "record", "name": "Node", "fields": [
            {"name": "next", "type": ["null", "Node"], "default": null}
        ]}
        "#;
        let a = parse(body);
        let b = parse(body);
        assert!(a.is_backward_compatible_with(&b));
    }

    #[test]
    fn test_malformed_schema_fails_parsing() {
        assert!(ParsedAvroSchema::parse(r#"{"type": "recard"}"#, &[]).is_err());
        assert!(ParsedAvroSchema::parse("not json", &[]).is_err());
    }
}
