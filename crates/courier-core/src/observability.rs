// Copyright (c) 2024-2026 The Courier Authors
//
// SPDX-License-Identifier: MIT
//! The observability event bus: best-effort fire-and-forget telemetry,
//! distinct from the lazy-sequence consumer channel (which is the
//! authoritative control-plane channel). The two are fed in consistent
//! order but are not transactional with each other.
use std::sync::Arc;

use serde_json::Value;

/// Identity/correlation ids carried on every observability event.
#[derive(Debug, Clone, Default)]
pub struct EventIds {
    pub trace_id: String,
    pub session_id: String,
    pub tenant_id: String,
    pub agent_name: String,
    pub request_id: String,
}

/// A single observability event: a name drawn from the fixed vocabulary
/// (`agent.start`, `llm.request`, `tool.error`, ...) plus arbitrary fields.
#[derive(Debug, Clone)]
pub struct ObservabilityEvent {
    pub name: &'static str,
    pub ids: EventIds,
    pub fields: Value,
}

/// Sink for observability events. The default is a no-op; real deployments
/// wire this to their telemetry stack (external to this crate).
pub trait EventBus: Send + Sync {
    fn publish(&self, event: ObservabilityEvent);
}

/// Default sink: drops every event. Configuring an estimator/bus is opt-in.
pub struct NoopEventBus;

impl EventBus for NoopEventBus {
    fn publish(&self, _event: ObservabilityEvent) {}
}

/// Sink that forwards every event through [`tracing`] at debug level, one
/// structured field per event field plus the correlation ids.
pub struct TracingEventBus;

impl EventBus for TracingEventBus {
    fn publish(&self, event: ObservabilityEvent) {
        tracing::debug!(
            event = event.name,
            trace_id = %event.ids.trace_id,
            session_id = %event.ids.session_id,
            tenant_id = %event.ids.tenant_id,
            agent_name = %event.ids.agent_name,
            request_id = %event.ids.request_id,
            fields = %event.fields,
            "executor observability event"
        );
    }
}

pub type SharedEventBus = Arc<dyn EventBus>;

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingBus {
        events: Mutex<Vec<String>>,
    }

    impl EventBus for RecordingBus {
        fn publish(&self, event: ObservabilityEvent) {
            self.events.lock().unwrap().push(event.name.to_string());
        }
    }

    #[test]
    fn noop_bus_discards_events() {
        NoopEventBus.publish(ObservabilityEvent {
            name: "agent.start",
            ids: EventIds::default(),
            fields: Value::Null,
        });
    }

    #[test]
    fn tracing_bus_does_not_panic_on_publish() {
        TracingEventBus.publish(ObservabilityEvent {
            name: "llm.request",
            ids: EventIds { trace_id: "t1".into(), ..Default::default() },
            fields: serde_json::json!({"estimated_tokens": 42}),
        });
    }

    #[test]
    fn recording_bus_captures_published_event_names() {
        let bus = RecordingBus::default();
        bus.publish(ObservabilityEvent { name: "tool.start", ids: EventIds::default(), fields: Value::Null });
        bus.publish(ObservabilityEvent { name: "tool.complete", ids: EventIds::default(), fields: Value::Null });
        assert_eq!(*bus.events.lock().unwrap(), vec!["tool.start".to_string(), "tool.complete".to_string()]);
    }
}
