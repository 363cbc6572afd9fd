// Copyright (c) 2024-2026 The Courier Authors
//
// SPDX-License-Identifier: MIT
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tool::{ConcurrencyKeyedTool, Tool, ToolCall, ToolOutput};

/// Tracks how many [`ConcurrencyProbeTool`] invocations are live at once, so
/// tests can assert on peak concurrency reached during a parallel tool
/// dispatch batch.
#[derive(Clone, Default)]
pub struct ConcurrencyCounter {
    live: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ConcurrencyCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(live, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A tool that sleeps for a fixed duration while recording concurrent
/// in-flight invocations via a shared [`ConcurrencyCounter`]. Two instances
/// sharing a counter and dispatched in the same batch let tests observe
/// that the executor runs independent tool calls in parallel rather than
/// serially.
pub struct ConcurrencyProbeTool {
    name: String,
    sleep: Duration,
    counter: ConcurrencyCounter,
    concurrency_key: Option<String>,
}

impl ConcurrencyProbeTool {
    pub fn new(name: impl Into<String>, sleep: Duration, counter: ConcurrencyCounter) -> Self {
        Self { name: name.into(), sleep, counter, concurrency_key: None }
    }

    /// Give this instance a non-empty concurrency key, so the executor
    /// serializes it against other tools sharing the same key.
    pub fn with_concurrency_key(mut self, key: impl Into<String>) -> Self {
        self.concurrency_key = Some(key.into());
        self
    }
}

#[async_trait]
impl Tool for ConcurrencyProbeTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Sleeps briefly while recording live concurrency; for tests only."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "additionalProperties": false })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        self.counter.enter();
        tokio::time::sleep(self.sleep).await;
        self.counter.exit();
        ToolOutput::ok(&call.id, "done")
    }

    fn as_concurrency_keyed(&self) -> Option<&dyn ConcurrencyKeyedTool> {
        if self.concurrency_key.is_some() {
            Some(self)
        } else {
            None
        }
    }
}

impl ConcurrencyKeyedTool for ConcurrencyProbeTool {
    fn concurrency_key(&self, _call: &ToolCall) -> String {
        self.concurrency_key.clone().unwrap_or_default()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn two_concurrent_calls_reach_peak_of_two() {
        let counter = ConcurrencyCounter::new();
        let a = ConcurrencyProbeTool::new("a", Duration::from_millis(40), counter.clone());
        let b = ConcurrencyProbeTool::new("b", Duration::from_millis(40), counter.clone());
        let call_a = ToolCall { id: "a".into(), name: "a".into(), args: json!({}) };
        let call_b = ToolCall { id: "b".into(), name: "b".into(), args: json!({}) };
        let (out_a, out_b) = tokio::join!(a.execute(&call_a), b.execute(&call_b));
        assert!(!out_a.is_error);
        assert!(!out_b.is_error);
        assert!(counter.peak() >= 2, "expected peak concurrency >= 2, got {}", counter.peak());
    }

    #[tokio::test]
    async fn sequential_calls_reach_peak_of_one() {
        let counter = ConcurrencyCounter::new();
        let a = ConcurrencyProbeTool::new("a", Duration::from_millis(5), counter.clone());
        let call = ToolCall { id: "a".into(), name: "a".into(), args: json!({}) };
        a.execute(&call).await;
        a.execute(&call).await;
        assert_eq!(counter.peak(), 1);
    }

    #[test]
    fn without_key_has_no_concurrency_capability() {
        let t = ConcurrencyProbeTool::new("a", Duration::from_millis(1), ConcurrencyCounter::new());
        assert!(t.as_concurrency_keyed().is_none());
    }

    #[test]
    fn with_key_exposes_concurrency_capability() {
        let t = ConcurrencyProbeTool::new("a", Duration::from_millis(1), ConcurrencyCounter::new())
            .with_concurrency_key("shared-lock");
        let keyed = t.as_concurrency_keyed().expect("should expose concurrency key");
        let call = ToolCall { id: "x".into(), name: "a".into(), args: json!({}) };
        assert_eq!(keyed.concurrency_key(&call), "shared-lock");
    }
}
