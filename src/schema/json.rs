//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! JSON Schema parsing and compatibility
//!
//! Documents are draft-07 JSON Schemas. At parse time the body and its
//! references are assembled into one composite document: every `$ref` is
//! rewritten to an internal JSON pointer (`#/schema`, `#/references/<name>`),
//! so a `$ref` to anything that is neither the current document nor a
//! registered reference fails compilation — schema parsing can never touch
//! the filesystem or the network.
//!
//! Compatibility is a type-directed structural diff that rejects whenever
//! the new schema (writer) narrows the set of values the old schema (reader)
//! accepted. `allOf`/`anyOf`/`oneOf` are not analyzed and pass
//! unconditionally.

use std::collections::{BTreeSet, HashSet};

use jsonschema::{Draft, JSONSchema};
use regex::Regex;
use serde_json::{json, Map, Value};

use crate::error::{RegistryError, RegistryResult};

/// A parsed JSON Schema with its references folded into one document
#[derive(Debug)]
pub struct ParsedJsonSchema {
    /// `{"schema": <body>, "references": {<name>: <schema>, ..}}` with all
    /// `$ref`s rewritten to internal pointers
    root: Value,
}

impl ParsedJsonSchema {
    /// Parse and validate `body` with its references in scope
    pub fn parse(body: &str, references: &[(String, String)]) -> RegistryResult<ParsedJsonSchema> {
        let mut registry = Map::new();
        for (name, raw) in references {
            let mut document: Value = serde_json::from_str(raw).map_err(|e| {
                RegistryError::invalid_schema(format!(
                    "error parsing json schema reference {name}: {e}"
                ))
            })?;
            let base = format!("#/references/{}", escape_pointer_token(name));
            rewrite_refs(&mut document, &base, references);
            registry.insert(name.clone(), document);
        }

        let mut body_value: Value = serde_json::from_str(body)
            .map_err(|e| RegistryError::invalid_schema(format!("error parsing json schema: {e}")))?;
        rewrite_refs(&mut body_value, "#/schema", references);

        let root = json!({
            "schema": body_value,
            "references": Value::Object(registry),
        });

        // compile each reference, then the body, exactly as they will be
        // dereferenced later
        for (name, _) in references {
            let pointer = format!("#/references/{}", escape_pointer_token(name));
            compile_pointer(&root, &pointer).map_err(|e| {
                RegistryError::invalid_schema(format!(
                    "error compiling json schema reference {name}: {e}"
                ))
            })?;
        }
        compile_pointer(&root, "#/schema")
            .map_err(|e| RegistryError::invalid_schema(format!("error compiling json schema: {e}")))?;

        Ok(ParsedJsonSchema { root })
    }

    /// Whether this schema (writer) is backward compatible with `previous`
    /// (reader)
    pub fn is_backward_compatible_with(&self, previous: &ParsedJsonSchema) -> bool {
        let reader = Node {
            root: &previous.root,
            value: previous.root.pointer("/schema").unwrap_or(&previous.root),
        };
        let writer = Node {
            root: &self.root,
            value: self.root.pointer("/schema").unwrap_or(&self.root),
        };

        let mut checker = Checker {
            visited: HashSet::new(),
        };
        checker.compatible(Some(reader), Some(writer))
    }
}

/// Escape a reference name for use as a JSON pointer token
fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Rewrite every `$ref` in `value` to an internal pointer
///
/// `base` is the pointer under which this document lives in the composite.
/// Targets that match no registered reference are left alone; compilation
/// rejects them if anything actually points there.
fn rewrite_refs(value: &mut Value, base: &str, references: &[(String, String)]) {
    match value {
        Value::Object(map) => {
            for (key, entry) in map.iter_mut() {
                if key == "$ref" {
                    if let Value::String(target) = entry {
                        *target = rewrite_target(target, base, references);
                    }
                } else {
                    rewrite_refs(entry, base, references);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                rewrite_refs(item, base, references);
            }
        }
        _ => {}
    }
}

fn rewrite_target(target: &str, base: &str, references: &[(String, String)]) -> String {
    if target == "#" {
        return base.to_string();
    }
    if let Some(pointer) = target.strip_prefix('#') {
        return format!("{base}{pointer}");
    }

    let (name, fragment) = match target.split_once('#') {
        Some((name, fragment)) => (name, fragment),
        None => (target, ""),
    };
    if references.iter().any(|(known, _)| known == name) {
        format!("#/references/{}{}", escape_pointer_token(name), fragment)
    } else {
        target.to_string()
    }
}

/// Compile the subschema at `pointer` within the composite document
fn compile_pointer(root: &Value, pointer: &str) -> Result<(), String> {
    let Value::Object(map) = root else {
        return Err("composite schema document is not an object".to_string());
    };

    let mut composite = map.clone();
    composite.insert("allOf".to_string(), json!([{ "$ref": pointer }]));
    let composite = Value::Object(composite);

    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&composite)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// A schema node paired with the composite document that owns it
#[derive(Clone, Copy)]
struct Node<'a> {
    root: &'a Value,
    value: &'a Value,
}

impl<'a> Node<'a> {
    /// Follow `$ref` pointers until a concrete schema (bounded against
    /// ref-to-ref cycles)
    fn deref(mut self) -> Node<'a> {
        for _ in 0..64 {
            let Some(object) = self.value.as_object() else {
                return self;
            };
            let Some(Value::String(target)) = object.get("$ref") else {
                return self;
            };
            let Some(pointer) = target.strip_prefix('#') else {
                return self;
            };
            match self.root.pointer(pointer) {
                Some(next) => self.value = next,
                None => return self,
            }
        }
        self
    }

    fn get(&self, key: &str) -> Option<Node<'a>> {
        self.value.as_object()?.get(key).map(|value| Node {
            root: self.root,
            value,
        })
    }

    fn f64_of(&self, key: &str) -> Option<f64> {
        self.value.get(key)?.as_f64()
    }

    fn str_of(&self, key: &str) -> Option<&'a str> {
        self.value.get(key)?.as_str()
    }

    fn bool_schema(&self) -> Option<bool> {
        self.value.as_bool()
    }

    /// The schema's primary type: the `type` keyword, or the first entry of
    /// its array form
    fn type_name(&self) -> Option<&'a str> {
        match self.value.get("type")? {
            Value::String(name) => Some(name),
            Value::Array(names) => names.first()?.as_str(),
            _ => None,
        }
    }

    fn object_map(&self, key: &str) -> Option<&'a Map<String, Value>> {
        self.value.get(key)?.as_object()
    }

    fn enum_values(&self) -> &'a [Value] {
        self.value
            .get("enum")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn requires(&self, property: &str) -> bool {
        self.value
            .get("required")
            .and_then(Value::as_array)
            .map(|keys| keys.iter().any(|k| k.as_str() == Some(property)))
            .unwrap_or(false)
    }
}

/// `maxLength`-style keywords: adding or tightening the bound narrows
fn max_keyword_compatible(reader: Option<f64>, writer: Option<f64>) -> bool {
    match (reader, writer) {
        (None, Some(_)) => false,
        (Some(_), None) => true,
        (Some(reader), Some(writer)) => writer >= reader,
        (None, None) => true,
    }
}

/// `minLength`-style keywords: adding or raising the bound narrows
fn min_keyword_compatible(reader: Option<f64>, writer: Option<f64>) -> bool {
    match (reader, writer) {
        (None, Some(_)) => false,
        (Some(_), None) => true,
        (Some(reader), Some(writer)) => writer <= reader,
        (None, None) => true,
    }
}

fn divides(divisor: f64, dividend: f64) -> bool {
    if divisor == 0.0 {
        return false;
    }
    let quotient = dividend / divisor;
    (quotient - quotient.round()).abs() < 1e-9
}

/// The structural diff; `visited` keys on node identity so cyclic `$ref`
/// graphs terminate (revisits report compatible, the fixed point)
struct Checker {
    visited: HashSet<(usize, usize)>,
}

impl Checker {
    fn compatible(&mut self, reader: Option<Node<'_>>, writer: Option<Node<'_>>) -> bool {
        let (reader, writer) = match (reader, writer) {
            (None, None) => return true,
            // constraint added, narrows
            (None, Some(_)) => return false,
            // constraint removed, widens
            (Some(_), None) => return true,
            (Some(reader), Some(writer)) => (reader.deref(), writer.deref()),
        };

        let key = (
            reader.value as *const Value as usize,
            writer.value as *const Value as usize,
        );
        if !self.visited.insert(key) {
            return true;
        }

        let reader_type = reader.type_name();
        let writer_type = writer.type_name();
        fn normalize(t: Option<&str>) -> Option<&str> {
            match t {
                Some("integer") => Some("number"),
                other => other,
            }
        }
        let reader_cmp = normalize(reader_type);
        let writer_cmp = normalize(writer_type);

        if reader_cmp != writer_cmp {
            // the old schema accepted nothing at all
            if reader.bool_schema() == Some(false) {
                return true;
            }
            // the new schema accepts everything
            if writer.bool_schema() == Some(true)
                || (writer_cmp.is_none() && writer.bool_schema() != Some(false))
            {
                return true;
            }
            return false;
        }

        if !self.enums_compatible(&reader, &writer) {
            return false;
        }

        // the new `not` may only narrow the old one
        if !self.compatible(reader.get("not"), writer.get("not")) {
            return false;
        }

        match writer_type {
            Some("string") => self.string_compatible(&reader, &writer),
            Some("integer") | Some("number") => {
                if writer_type != reader_type && writer_type == Some("integer") {
                    // number narrowed to integer
                    return false;
                }
                self.number_compatible(&reader, &writer)
            }
            Some("object") => self.object_compatible(&reader, &writer),
            Some("array") => self.array_compatible(&reader, &writer),
            _ => true,
        }
    }

    /// The new enum must be a (non-strict) superset of the old one
    fn enums_compatible(&self, reader: &Node<'_>, writer: &Node<'_>) -> bool {
        let reader_enum = reader.enum_values();
        let writer_enum = writer.enum_values();
        reader_enum.iter().all(|value| writer_enum.contains(value))
    }

    fn string_compatible(&mut self, reader: &Node<'_>, writer: &Node<'_>) -> bool {
        if !max_keyword_compatible(reader.f64_of("maxLength"), writer.f64_of("maxLength")) {
            return false;
        }
        if !min_keyword_compatible(reader.f64_of("minLength"), writer.f64_of("minLength")) {
            return false;
        }
        match (reader.str_of("pattern"), writer.str_of("pattern")) {
            (None, Some(_)) => false,
            (Some(_), None) => true,
            (Some(reader), Some(writer)) => reader == writer,
            (None, None) => true,
        }
    }

    fn number_compatible(&mut self, reader: &Node<'_>, writer: &Node<'_>) -> bool {
        if !max_keyword_compatible(reader.f64_of("maximum"), writer.f64_of("maximum")) {
            return false;
        }
        if !min_keyword_compatible(reader.f64_of("minimum"), writer.f64_of("minimum")) {
            return false;
        }
        if !max_keyword_compatible(
            reader.f64_of("exclusiveMaximum"),
            writer.f64_of("exclusiveMaximum"),
        ) {
            return false;
        }
        if !min_keyword_compatible(
            reader.f64_of("exclusiveMinimum"),
            writer.f64_of("exclusiveMinimum"),
        ) {
            return false;
        }
        match (reader.f64_of("multipleOf"), writer.f64_of("multipleOf")) {
            (None, Some(_)) => false,
            (Some(_), None) => true,
            (None, None) => true,
            // the writer's multiple may only divide the reader's
            (Some(reader), Some(writer)) => divides(writer, reader),
        }
    }

    fn object_compatible(&mut self, reader: &Node<'_>, writer: &Node<'_>) -> bool {
        if !max_keyword_compatible(reader.f64_of("maxProperties"), writer.f64_of("maxProperties")) {
            return false;
        }
        if !min_keyword_compatible(reader.f64_of("minProperties"), writer.f64_of("minProperties")) {
            return false;
        }
        if !self.additional_compatible(reader, writer, "additionalProperties") {
            return false;
        }
        if !self.dependencies_compatible(reader, writer) {
            return false;
        }

        let reader_props = reader.object_map("properties");
        let writer_props = writer.object_map("properties");

        let mut keys: BTreeSet<&str> = BTreeSet::new();
        keys.extend(reader_props.iter().flat_map(|m| m.keys()).map(String::as_str));
        keys.extend(writer_props.iter().flat_map(|m| m.keys()).map(String::as_str));

        for key in keys {
            let reader_prop = reader_props.and_then(|m| m.get(key)).map(|value| Node {
                root: reader.root,
                value,
            });
            let writer_prop = writer_props.and_then(|m| m.get(key)).map(|value| Node {
                root: writer.root,
                value,
            });

            match (reader_prop, writer_prop) {
                (Some(reader_prop), None) => {
                    // property removed; the new schema's content model decides
                    // what values the key may now take
                    if is_open_content_model(writer) {
                        continue;
                    }
                    if let Some(cover) = partially_open_cover(writer, key) {
                        if !self.compatible(Some(reader_prop), Some(cover)) {
                            return false;
                        }
                        continue;
                    }
                    if reader_prop.deref().bool_schema() == Some(false) {
                        continue;
                    }
                    return false;
                }
                (None, Some(writer_prop)) => {
                    if is_open_content_model(reader) {
                        // the old schema accepted anything here; only an
                        // unconstrained property may be added
                        if writer_prop.deref().type_name().is_some() {
                            return false;
                        }
                        continue;
                    }
                    if let Some(cover) = partially_open_cover(reader, key) {
                        if !self.compatible(Some(cover), Some(writer_prop)) {
                            return false;
                        }
                    }
                    if writer.requires(key) && writer_prop.deref().get("default").is_none() {
                        return false;
                    }
                }
                (Some(reader_prop), Some(writer_prop)) => {
                    if !self.compatible(Some(reader_prop), Some(writer_prop)) {
                        return false;
                    }
                }
                (None, None) => unreachable!("key came from one of the two maps"),
            }
        }

        // an optional property may not become required without a default
        if let Some(reader_props) = reader_props {
            for key in reader_props.keys() {
                let Some(writer_prop) = writer_props.and_then(|m| m.get(key)) else {
                    continue;
                };
                if !reader.requires(key)
                    && writer.requires(key)
                    && writer_prop.get("default").is_none()
                {
                    return false;
                }
            }
        }

        true
    }

    /// `additionalProperties` / `additionalItems`: widening is fine,
    /// narrowing is not, schema forms recurse
    fn additional_compatible(&mut self, reader: &Node<'_>, writer: &Node<'_>, key: &str) -> bool {
        let reader_value = reader.get(key);
        let writer_value = writer.get(key);

        let reader_permits = reader_value
            .and_then(|n| n.value.as_bool())
            .unwrap_or(false);
        let writer_permits = writer_value
            .and_then(|n| n.value.as_bool())
            .unwrap_or(false);
        let reader_schema = reader_value.filter(|n| n.value.is_object());
        let writer_schema = writer_value.filter(|n| n.value.is_object());

        if reader_permits != writer_permits {
            return writer_permits;
        }
        if reader_schema.is_none() && writer_schema.is_some() {
            return false;
        }
        if reader_schema.is_some() && writer_schema.is_none() {
            return true;
        }
        self.compatible(reader_schema, writer_schema)
    }

    fn dependencies_compatible(&mut self, reader: &Node<'_>, writer: &Node<'_>) -> bool {
        let reader_deps = reader.object_map("dependencies");
        let writer_deps = writer.object_map("dependencies");

        let mut keys: BTreeSet<&str> = BTreeSet::new();
        keys.extend(reader_deps.iter().flat_map(|m| m.keys()).map(String::as_str));
        keys.extend(writer_deps.iter().flat_map(|m| m.keys()).map(String::as_str));

        for key in keys {
            let reader_value = reader_deps.and_then(|m| m.get(key));
            let writer_value = writer_deps.and_then(|m| m.get(key));

            let reader_array = reader_value.and_then(Value::as_array);
            let writer_array = writer_value.and_then(Value::as_array);
            if reader_array.is_some() || writer_array.is_some() {
                match (reader_array, writer_array) {
                    // dependency array removed
                    (Some(_), None) if writer_value.is_none() => {}
                    (None, Some(_)) => return false,
                    (Some(reader_list), Some(writer_list)) => {
                        let writer_has_all =
                            reader_list.iter().all(|item| writer_list.contains(item));
                        let reader_has_all =
                            writer_list.iter().all(|item| reader_list.contains(item));
                        if writer_has_all && reader_has_all {
                            // unchanged
                        } else if writer_has_all {
                            // dependency array extended
                            return false;
                        } else if !reader_has_all {
                            // dependency array changed
                            return false;
                        }
                    }
                    _ => {}
                }
            }

            let reader_schema = reader_value
                .filter(|v| v.is_object() || v.is_boolean())
                .map(|value| Node {
                    root: reader.root,
                    value,
                });
            let writer_schema = writer_value
                .filter(|v| v.is_object() || v.is_boolean())
                .map(|value| Node {
                    root: writer.root,
                    value,
                });
            if reader_schema.is_some() || writer_schema.is_some() {
                match (reader_schema, writer_schema) {
                    (Some(_), None) => {}
                    (None, Some(_)) => return false,
                    pair => {
                        if !self.compatible(pair.0, pair.1) {
                            return false;
                        }
                    }
                }
            }
        }

        true
    }

    fn array_compatible(&mut self, reader: &Node<'_>, writer: &Node<'_>) -> bool {
        if !max_keyword_compatible(reader.f64_of("maxItems"), writer.f64_of("maxItems")) {
            return false;
        }
        if !min_keyword_compatible(reader.f64_of("minItems"), writer.f64_of("minItems")) {
            return false;
        }

        let reader_unique = reader
            .get("uniqueItems")
            .and_then(|n| n.value.as_bool())
            .unwrap_or(false);
        let writer_unique = writer
            .get("uniqueItems")
            .and_then(|n| n.value.as_bool())
            .unwrap_or(false);
        if !reader_unique && writer_unique {
            return false;
        }

        if !self.additional_compatible(reader, writer, "additionalItems") {
            return false;
        }

        let reader_items = reader.get("items");
        let writer_items = writer.get("items");
        match (
            reader_items.map(|n| n.value.is_array()),
            writer_items.map(|n| n.value.is_array()),
        ) {
            (None, None) => {}
            (None, Some(_)) => return false,
            (Some(_), None) => {}
            (Some(false), Some(false)) => {
                if !self.compatible(reader_items, writer_items) {
                    return false;
                }
            }
            (Some(true), Some(true)) => {
                if !self.tuple_items_compatible(reader, writer) {
                    return false;
                }
            }
            // tuple form swapped with schema form
            _ => return false,
        }

        match (reader.get("contains"), writer.get("contains")) {
            (None, Some(_)) => return false,
            (Some(_), None) => {}
            (None, None) => {}
            pair => {
                if !self.compatible(pair.0, pair.1) {
                    return false;
                }
            }
        }
        if !min_keyword_compatible(reader.f64_of("minContains"), writer.f64_of("minContains")) {
            return false;
        }
        if !max_keyword_compatible(reader.f64_of("maxContains"), writer.f64_of("maxContains")) {
            return false;
        }

        true
    }

    fn tuple_items_compatible(&mut self, reader: &Node<'_>, writer: &Node<'_>) -> bool {
        let empty = Vec::new();
        let reader_tuple = reader
            .get("items")
            .and_then(|n| n.value.as_array())
            .unwrap_or(&empty);
        let writer_tuple = writer
            .get("items")
            .and_then(|n| n.value.as_array())
            .unwrap_or(&empty);

        let reader_additional = reader.get("additionalItems");
        let writer_additional = writer.get("additionalItems");

        for index in 0..reader_tuple.len().max(writer_tuple.len()) {
            let reader_item = reader_tuple.get(index).map(|value| Node {
                root: reader.root,
                value,
            });
            let writer_item = writer_tuple.get(index).map(|value| Node {
                root: writer.root,
                value,
            });

            match (reader_item, writer_item) {
                (Some(reader_item), Some(writer_item)) => {
                    if !self.compatible(Some(reader_item), Some(writer_item)) {
                        return false;
                    }
                }
                (Some(reader_item), None) => {
                    // position now governed by the writer's additionalItems
                    match writer_additional {
                        Some(n) if n.value.is_object() => {
                            if !self.compatible(Some(reader_item), Some(n)) {
                                return false;
                            }
                        }
                        Some(n) if n.value == &Value::Bool(false) => return false,
                        _ => {}
                    }
                }
                (None, Some(writer_item)) => {
                    // the old schema had no constraint at this position
                    match reader_additional {
                        Some(n) if n.value.is_object() => {
                            if !self.compatible(Some(n), Some(writer_item)) {
                                return false;
                            }
                        }
                        // the old schema rejected longer tuples outright
                        Some(n) if n.value == &Value::Bool(false) => {}
                        _ => {
                            if writer_item.deref().type_name().is_some() {
                                return false;
                            }
                        }
                    }
                }
                (None, None) => unreachable!("index bounded by the longer tuple"),
            }
        }

        true
    }
}

/// Open content model: no pattern properties, no additionalProperties
/// schema, additionalProperties explicitly true
fn is_open_content_model(node: &Node<'_>) -> bool {
    let pattern_empty = node
        .object_map("patternProperties")
        .map(Map::is_empty)
        .unwrap_or(true);
    let additional = node.get("additionalProperties");
    let permits = additional
        .as_ref()
        .and_then(|n| n.value.as_bool())
        .unwrap_or(false);
    let has_schema = additional
        .as_ref()
        .map(|n| n.value.is_object())
        .unwrap_or(false);
    pattern_empty && !has_schema && permits
}

/// The schema a partially open content model applies to `property`: the
/// first matching pattern property, else the additionalProperties schema
fn partially_open_cover<'a>(node: &Node<'a>, property: &str) -> Option<Node<'a>> {
    if let Some(patterns) = node.object_map("patternProperties") {
        for (pattern, schema) in patterns {
            let matched = Regex::new(pattern)
                .map(|re| re.is_match(property))
                .unwrap_or(false);
            if matched {
                return Some(Node {
                    root: node.root,
                    value: schema,
                });
            }
        }
    }
    node.get("additionalProperties")
        .filter(|n| n.value.is_object())
}
