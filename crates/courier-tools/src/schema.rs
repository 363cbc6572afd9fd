// Copyright (c) 2024-2026 The Courier Authors
//
// SPDX-License-Identifier: MIT
//! JSON-schema reflection for tool parameter types.
//!
//! Tool authors derive [`schemars::JsonSchema`] on their parameter struct and
//! describe fields with the crate's own attribute vocabulary
//! (`#[schemars(description = "...", default = ..., range(min = ..., max = ...))]`,
//! etc.) instead of hand-writing a `serde_json::json!` schema by hand.
use schemars::schema::{Schema, SchemaObject};
use schemars::{JsonSchema, SchemaGenerator};
use serde_json::Value;

/// Derive a JSON-schema object for `T`, suitable for a tool's
/// `parameters_schema()`.
///
/// Schemas are generated fully inlined: no `$ref`/`definitions` indirection,
/// since providers expect a single self-contained object. A type whose
/// recursion schemars cannot inline (a true cycle) degrades to a bare
/// `{"type": "object"}` rather than an unresolved `$ref`.
pub fn schema_for<T: JsonSchema>() -> Value {
    let mut settings = schemars::gen::SchemaSettings::draft07();
    settings.inline_subschemas = true;
    let generator = SchemaGenerator::new(settings);
    let schema = generator.into_root_schema_for::<T>();
    let value = serde_json::to_value(&schema.schema).unwrap_or_else(|_| serde_json::json!({"type": "object"}));
    if contains_ref(&value) {
        serde_json::json!({ "type": "object" })
    } else {
        value
    }
}

fn contains_ref(v: &Value) -> bool {
    match v {
        Value::Object(map) => {
            if map.contains_key("$ref") {
                return true;
            }
            map.values().any(contains_ref)
        }
        Value::Array(items) => items.iter().any(contains_ref),
        _ => false,
    }
}

/// Strip a schema down to a bare object shape — used as the degraded form
/// for cyclical types and exposed for tools that want to opt out of
/// reflection and declare a minimal schema explicitly.
pub fn opaque_object_schema() -> Value {
    let obj = SchemaObject { ..Default::default() };
    serde_json::to_value(Schema::Object(obj)).unwrap_or_else(|_| serde_json::json!({}))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::JsonSchema;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, JsonSchema)]
    struct SearchParams {
        /// The search query text
        query: String,
        /// Maximum number of results to return
        #[schemars(range(min = 1, max = 50))]
        #[serde(default)]
        limit: Option<u32>,
    }

    #[test]
    fn reflects_required_string_field() {
        let schema = schema_for::<SearchParams>();
        let required = schema["required"].as_array().expect("required array");
        assert!(required.iter().any(|v| v == "query"));
        assert!(!required.iter().any(|v| v == "limit"));
    }

    #[test]
    fn reflects_field_description_from_doc_comment() {
        let schema = schema_for::<SearchParams>();
        let desc = schema["properties"]["query"]["description"].as_str().unwrap_or("");
        assert!(desc.contains("search query"));
    }

    #[test]
    fn reflects_numeric_range() {
        let schema = schema_for::<SearchParams>();
        let limit = &schema["properties"]["limit"];
        assert_eq!(limit["maximum"], 50);
    }

    #[derive(Serialize, Deserialize, JsonSchema)]
    struct Recursive {
        name: String,
        children: Vec<Recursive>,
    }

    #[test]
    fn recursive_type_does_not_leak_unresolved_ref() {
        let schema = schema_for::<Recursive>();
        assert!(!contains_ref(&schema), "schema must not contain a bare $ref: {schema}");
    }

    #[test]
    fn opaque_object_schema_is_bare_object_type() {
        let schema = opaque_object_schema();
        assert_eq!(schema["type"], "object");
    }
}
