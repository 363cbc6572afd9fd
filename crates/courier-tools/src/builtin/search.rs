// Copyright (c) 2024-2026 The Courier Authors
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::schema_for;
use crate::tool::{Tool, ToolCall, ToolOutput};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct SearchParams {
    /// The thing to look up
    query: String,
}

/// A deterministic lookup tool over a tiny fixed table. Exists so demos and
/// tests can exercise multi-tool turns without a live search backend.
pub struct SearchTool {
    table: std::collections::HashMap<String, String>,
}

impl SearchTool {
    pub fn new() -> Self {
        let mut table = std::collections::HashMap::new();
        table.insert("price".to_string(), "$100".to_string());
        Self { table }
    }

    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.table.insert(key.into(), value.into());
        self
    }
}

impl Default for SearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Look up a known fact by query string."
    }

    fn parameters_schema(&self) -> Value {
        schema_for::<SearchParams>()
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let query = match call.args.get("query").and_then(|v| v.as_str()) {
            Some(q) => q,
            None => return ToolOutput::err(&call.id, "missing 'query'"),
        };
        match self.table.get(query) {
            Some(v) => ToolOutput::ok(&call.id, v.clone()),
            None => ToolOutput::err(&call.id, format!("no entry for '{query}'")),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn known_query_returns_value() {
        let t = SearchTool::new();
        let call = ToolCall { id: "c1".into(), name: "search".into(), args: json!({"query": "price"}) };
        let out = t.execute(&call).await;
        assert!(!out.is_error);
        assert_eq!(out.content, "$100");
    }

    #[tokio::test]
    async fn unknown_query_is_error() {
        let t = SearchTool::new();
        let call = ToolCall { id: "c1".into(), name: "search".into(), args: json!({"query": "nope"}) };
        let out = t.execute(&call).await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn missing_query_is_error() {
        let t = SearchTool::new();
        let call = ToolCall { id: "c1".into(), name: "search".into(), args: json!({}) };
        let out = t.execute(&call).await;
        assert!(out.is_error);
        assert!(out.content.contains("missing"));
    }
}
