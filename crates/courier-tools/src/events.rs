// Copyright (c) 2024-2026 The Courier Authors
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tool::ToolOutput;

/// A question extracted from a validated `ask_user_question` interrupt
/// payload, handed to consumers for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterruptQuestion {
    pub id: String,
    pub question: String,
    pub header: String,
    #[serde(rename = "multiSelect")]
    pub multi_select: bool,
    pub options: Vec<InterruptOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterruptOption {
    pub id: String,
    pub label: String,
    pub description: String,
}

/// Token usage summary attached to a `done` event. Mirrors the provider's
/// usage shape without depending on a specific model crate.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UsageSummary {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cache_read_tokens: u32,
    pub cache_write_tokens: u32,
}

/// An interrupt raised mid-execution, awaiting out-of-band resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterruptEvent {
    pub kind: String,
    pub payload: Value,
    pub agent_name: String,
    pub session_id: String,
    /// Set once the pausing checkpoint has been saved.
    pub checkpoint_id: Option<String>,
    pub questions: Vec<InterruptQuestion>,
}

/// The tagged union of events a running execution yields to its consumer.
///
/// Emitted strictly in causal order; see the ordering guarantees in the
/// concurrency model this crate's consumers are built against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutorEvent {
    /// An accumulated content delta from the model stream.
    Content { delta: String, accumulated: String },
    /// An accumulated reasoning/thinking delta from the model stream.
    Thinking { delta: String },
    /// A tool invocation has begun.
    ToolStart { call_id: String, name: String, agent_name: Option<String> },
    /// A tool invocation has finished (successfully or with an error result).
    ToolEnd { call_id: String, name: String, output: ToolOutput, agent_name: Option<String> },
    /// The execution paused awaiting an out-of-band resume.
    Interrupt(InterruptEvent),
    /// The execution finished successfully.
    Done {
        content: String,
        finish_reason: String,
        usage: UsageSummary,
        citations: Vec<Value>,
        thinking: String,
    },
    /// The execution terminated with an error.
    Error { message: String, kind: String },
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_event_serializes_with_type_tag() {
        let ev = ExecutorEvent::Content { delta: "a".into(), accumulated: "a".into() };
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["type"], "content");
    }

    #[test]
    fn tool_start_and_end_share_call_id() {
        let start = ExecutorEvent::ToolStart { call_id: "c1".into(), name: "search".into(), agent_name: None };
        let end = ExecutorEvent::ToolEnd {
            call_id: "c1".into(),
            name: "search".into(),
            output: ToolOutput::ok("c1", "done"),
            agent_name: None,
        };
        match (start, end) {
            (ExecutorEvent::ToolStart { call_id: a, .. }, ExecutorEvent::ToolEnd { call_id: b, .. }) => {
                assert_eq!(a, b);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn interrupt_event_carries_checkpoint_id_after_save() {
        let mut ev = InterruptEvent {
            kind: "ask_user_question".into(),
            payload: serde_json::json!({}),
            agent_name: "root".into(),
            session_id: "s1".into(),
            checkpoint_id: None,
            questions: vec![],
        };
        assert!(ev.checkpoint_id.is_none());
        ev.checkpoint_id = Some("chk-1".into());
        assert_eq!(ev.checkpoint_id.as_deref(), Some("chk-1"));
    }
}
