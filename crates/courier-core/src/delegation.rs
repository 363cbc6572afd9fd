// Copyright (c) 2024-2026 The Courier Authors
//
// SPDX-License-Identifier: MIT
//! The delegation tool (`task`): spawns a child Executor under an existing
//! agent registry, forwarding the child's events to the parent's consumer
//! with identity attribution, and prevents recursive re-delegation.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use courier_model::ModelProvider;
use courier_tools::{EmitFn, ExecutorEvent, Tool, ToolCall, ToolOutput};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::agent::AgentRegistry;
use crate::error::ExecutorError;
use crate::executor::{Executor, ExecutorConfig, ExecutorInput};
use crate::lazy_sequence::SequenceError;

/// A tool call captured verbatim into a [`crate::checkpoint::Checkpoint`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingToolCall {
    pub id: String,
    pub name: String,
    pub args: Value,
}

impl From<&ToolCall> for PendingToolCall {
    fn from(call: &ToolCall) -> Self {
        Self { id: call.id.clone(), name: call.name.clone(), args: call.args.clone() }
    }
}

impl From<PendingToolCall> for ToolCall {
    fn from(p: PendingToolCall) -> Self {
        Self { id: p.id, name: p.name, args: p.args }
    }
}

pub const DELEGATION_TOOL_NAME: &str = "task";
const MAX_DEPTH: usize = 3;

/// Spawns a child [`Executor`] for the named subagent and drives it to
/// completion, forwarding its events into the parent's consumer via `emit`.
pub struct DelegationTool {
    agents: Arc<AgentRegistry>,
    model: Arc<dyn ModelProvider>,
    tenant_id: String,
    session_id: String,
    parent_agent_name: String,
    depth: Arc<AtomicUsize>,
}

impl DelegationTool {
    pub fn new(
        agents: Arc<AgentRegistry>,
        model: Arc<dyn ModelProvider>,
        tenant_id: impl Into<String>,
        session_id: impl Into<String>,
        parent_agent_name: impl Into<String>,
    ) -> Self {
        Self {
            agents,
            model,
            tenant_id: tenant_id.into(),
            session_id: session_id.into(),
            parent_agent_name: parent_agent_name.into(),
            depth: Arc::new(AtomicUsize::new(0)),
        }
    }

    async fn run(&self, call: &ToolCall, emit: EmitFn) -> Result<ToolOutput, ExecutorError> {
        let subagent_type = call
            .args
            .get("subagent_type")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ExecutorError::Validation("subagent_type: must be a non-empty string".to_string()))?;
        let prompt = call
            .args
            .get("prompt")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ExecutorError::Validation("prompt: must be a non-empty string".to_string()))?;
        let description = call
            .args
            .get("description")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ExecutorError::Validation("description: must be a non-empty string".to_string()))?;
        let _ = description; // surfaced to the parent's observability, not used further here

        if self.depth.load(Ordering::SeqCst) >= MAX_DEPTH {
            return Err(ExecutorError::Validation("delegation depth exceeded".to_string()));
        }

        let child_agent = self.agents.get(subagent_type).ok_or_else(|| {
            let available = self.agents.names().join(", ");
            ExecutorError::NotFound(format!("unknown subagent {subagent_type}; available: {available}"))
        })?;

        // Recursion prevention: the delegation tool is never part of a
        // child's own tool set.
        let child_tools = Arc::new(child_agent.tools.without(DELEGATION_TOOL_NAME));
        let child_agent = Arc::new(
            crate::agent::Agent::new(child_agent.name.clone(), child_agent.description.clone(), child_tools)
                .with_metadata(child_agent.metadata.clone()),
        );

        self.depth.fetch_add(1, Ordering::SeqCst);
        let result = self.drive_child(child_agent, prompt, emit).await;
        self.depth.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn drive_child(
        &self,
        child_agent: Arc<crate::agent::Agent>,
        prompt: &str,
        emit: EmitFn,
    ) -> Result<ToolOutput, ExecutorError> {
        let child_name = child_agent.name.clone();
        let executor = Executor::new(child_agent, self.model.clone(), ExecutorConfig::default());
        let input = ExecutorInput {
            messages: vec![courier_model::Message::user(prompt)],
            session_id: self.session_id.clone(),
            tenant_id: self.tenant_id.clone(),
            thread_id: None,
            trace_id: None,
            provider_continuity_token: None,
            is_resume: false,
        };

        let mut seq = executor.execute(input);
        let mut result_text = String::new();
        let mut usage = courier_tools::UsageSummary::default();
        loop {
            match seq.next().await {
                Ok(event) => match event {
                    ExecutorEvent::ToolStart { call_id, name, .. } => {
                        emit(ExecutorEvent::ToolStart { call_id, name, agent_name: Some(child_name.clone()) });
                    }
                    ExecutorEvent::ToolEnd { call_id, name, output, .. } => {
                        emit(ExecutorEvent::ToolEnd {
                            call_id,
                            name,
                            output,
                            agent_name: Some(child_name.clone()),
                        });
                    }
                    ExecutorEvent::Thinking { delta } => {
                        emit(ExecutorEvent::Thinking { delta });
                    }
                    // Content deltas are internal to the child; only its
                    // final result matters to the parent.
                    ExecutorEvent::Content { .. } => {}
                    ExecutorEvent::Interrupt(_) => {
                        seq.close();
                        return Err(ExecutorError::Validation(
                            "a delegated subagent cannot raise an interrupt".to_string(),
                        ));
                    }
                    ExecutorEvent::Done { content, usage: u, .. } => {
                        result_text = content;
                        usage = u;
                    }
                    ExecutorEvent::Error { message, .. } => {
                        seq.close();
                        return Err(ExecutorError::Transient(message));
                    }
                },
                Err(SequenceError::Done) | Err(SequenceError::Closed) => break,
                Err(SequenceError::Other(e)) => return Err(ExecutorError::Transient(e.to_string())),
            }
        }
        seq.close();

        let envelope = json!({
            "agent": child_name,
            "result": result_text,
            "usage": {
                "input_tokens": usage.input_tokens,
                "output_tokens": usage.output_tokens,
            },
        });
        Ok(ToolOutput::ok("", envelope.to_string()))
    }
}

#[async_trait]
impl Tool for DelegationTool {
    fn name(&self) -> &str {
        DELEGATION_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Delegate a task to a named subagent and return its final result."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "subagent_type": { "type": "string", "description": "Name of the subagent to delegate to" },
                "prompt": { "type": "string", "description": "Task prompt for the subagent" },
                "description": { "type": "string", "description": "Short description of the delegated task" },
            },
            "required": ["subagent_type", "prompt", "description"],
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let emit: EmitFn = Arc::new(|_event| {});
        match self.run(call, emit).await {
            Ok(mut out) => {
                out.call_id = call.id.clone();
                out
            }
            Err(e) => ToolOutput::err(&call.id, e.to_string()),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
