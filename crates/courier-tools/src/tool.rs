// Copyright (c) 2024-2026 The Courier Authors
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::events::ExecutorEvent;

/// A single tool invocation requested by the model.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Opaque identifier returned by the model (forwarded verbatim)
    pub id: String,
    pub name: String,
    /// Parsed JSON arguments
    pub args: Value,
}

/// A single content item in a rich tool output.
///
/// Most tools produce only `Text`. Tools that read images may produce a
/// mix of `Text` and `Image` items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ToolOutputPart {
    /// Plain UTF-8 text.
    Text(String),
    /// Base64 data URL: `data:<mime>;base64,<b64>`.
    Image(String),
}

/// The result of executing a tool.
///
/// `content` is always the plain-text representation of the output (the
/// concatenation of all `Text` parts).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub call_id: String,
    pub content: String,
    /// Structured parts (text and/or images). For tools that only return
    /// text this contains exactly one `Text` part mirroring `content`.
    pub parts: Vec<ToolOutputPart>,
    /// If true, the tool execution failed non-fatally (returned error message).
    pub is_error: bool,
}

impl ToolOutput {
    /// Successful plain-text result.
    pub fn ok(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let text = content.into();
        let call_id = call_id.into();
        Self {
            call_id,
            content: text.clone(),
            parts: vec![ToolOutputPart::Text(text)],
            is_error: false,
        }
    }

    /// Error result containing a plain-text error message.
    pub fn err(call_id: impl Into<String>, msg: impl Into<String>) -> Self {
        let text = msg.into();
        let call_id = call_id.into();
        Self {
            call_id,
            content: text.clone(),
            parts: vec![ToolOutputPart::Text(text)],
            is_error: true,
        }
    }

    /// Result with arbitrary parts (text and/or images).
    ///
    /// `content` is set to the concatenation of all Text parts.
    pub fn with_parts(call_id: impl Into<String>, parts: Vec<ToolOutputPart>) -> Self {
        let text = parts
            .iter()
            .filter_map(|p| match p {
                ToolOutputPart::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            call_id: call_id.into(),
            content: text,
            parts,
            is_error: false,
        }
    }

    /// Return `true` if this output contains at least one image part.
    pub fn has_images(&self) -> bool {
        self.parts
            .iter()
            .any(|p| matches!(p, ToolOutputPart::Image(_)))
    }
}

/// A structured tool result: a codec id identifying how `payload` should be
/// rendered for the model, plus any side-channel artifacts.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub codec_id: String,
    pub payload: Value,
    pub artifacts: Vec<ToolOutputPart>,
}

/// Sentinel error: a non-nil [`ToolResult`] carried alongside this error
/// means the formatted payload IS the tool's error message — the executor
/// returns the formatted output to the model as a normal tool response
/// rather than surfacing a dispatch failure.
#[derive(Debug)]
pub struct StructuredToolOutput(pub ToolResult);

impl std::fmt::Display for StructuredToolOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "structured tool output ({})", self.0.codec_id)
    }
}

impl std::error::Error for StructuredToolOutput {}

/// A thread-safe callback a streaming tool uses to forward an
/// [`ExecutorEvent`] into the outer consumer's stream while it is still
/// running. Used by delegation to relay a sub-agent's events live.
pub type EmitFn = std::sync::Arc<dyn Fn(ExecutorEvent) + Send + Sync>;

/// Trait that every built-in and user-defined tool must implement.
///
/// Optional capabilities — streaming, structured output, concurrency
/// keying — are discovered structurally at dispatch time via the
/// downcast hooks below rather than as required methods, so a plain tool
/// pays no cost for capabilities it doesn't have.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema for parameters
    fn parameters_schema(&self) -> Value;
    /// Execute the tool. Errors should be wrapped in [`ToolOutput::err`].
    async fn execute(&self, call: &ToolCall) -> ToolOutput;

    /// Returns `Some` if this tool can report progress while running.
    fn as_streaming(&self) -> Option<&dyn StreamingTool> {
        None
    }
    /// Returns `Some` if this tool's natural result is structured data.
    fn as_structured(&self) -> Option<&dyn StructuredTool> {
        None
    }
    /// Returns `Some` if invocations of this tool must serialize against
    /// other invocations sharing the same concurrency key.
    fn as_concurrency_keyed(&self) -> Option<&dyn ConcurrencyKeyedTool> {
        None
    }
}

/// A tool that can emit progress events while it runs instead of only
/// returning a single result at the end.
#[async_trait]
pub trait StreamingTool: Tool {
    async fn execute_streaming(&self, call: &ToolCall, emit: EmitFn) -> ToolOutput;
}

/// A tool whose result is naturally structured data rather than prose. The
/// payload is always stringified (pretty-printed JSON) for the model; the
/// `codec_id` is carried through for consumers that want to interpret the
/// original shape.
#[async_trait]
pub trait StructuredTool: Tool {
    async fn execute_structured(&self, call: &ToolCall) -> Result<ToolResult, StructuredToolOutput>;
}

/// A tool whose invocations sharing a non-empty concurrency key must run
/// serially relative to each other. Tools with distinct or empty keys may
/// run in parallel within the same batch.
pub trait ConcurrencyKeyedTool: Tool {
    fn concurrency_key(&self, call: &ToolCall) -> String;
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;

    // -- Tool trait defaults --

    struct MinimalTool;

    #[async_trait]
    impl Tool for MinimalTool {
        fn name(&self) -> &str {
            "minimal"
        }
        fn description(&self) -> &str {
            "a minimal tool"
        }
        fn parameters_schema(&self) -> Value {
            json!({ "type": "object" })
        }
        async fn execute(&self, call: &ToolCall) -> ToolOutput {
            ToolOutput::ok(&call.id, "ok")
        }
    }

    #[test]
    fn tool_default_has_no_optional_capabilities() {
        let t = MinimalTool;
        assert!(t.as_streaming().is_none());
        assert!(t.as_structured().is_none());
        assert!(t.as_concurrency_keyed().is_none());
    }
}
