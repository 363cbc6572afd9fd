// Copyright (c) 2024-2026 The Courier Authors
//
// SPDX-License-Identifier: MIT
//! The ReAct iteration loop: stream a model turn, dispatch any requested
//! tools (in parallel, with speculative early-start and concurrency-key
//! locking), feed results back, and repeat until the model stops calling
//! tools, a termination tool fires, an interrupt is raised, or the
//! iteration cap is hit.
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use courier_model::{
    CompletionRequest, FunctionCall, Message, MessageContent, ModelProvider, ResponseEvent, Role,
    ToolSchema as ModelToolSchema,
};
use courier_tools::{
    EmitFn, ExecutorEvent, InterruptEvent, InterruptQuestion, Tool, ToolCall, ToolOutput,
    ToolOutputPart, ToolRegistry, ToolResult, UsageSummary,
};
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinSet;

use crate::agent::Agent;
use crate::checkpoint::{Checkpoint, CheckpointError, SharedCheckpointer};
use crate::delegation::PendingToolCall;
use crate::error::ExecutorError;
use crate::interrupt::{InterruptRegistry, ASK_USER_QUESTION};
use crate::lazy_sequence::{LazySequence, Yielder};
use crate::observability::{EventIds, NoopEventBus, ObservabilityEvent, SharedEventBus};
use crate::token::{NoopEstimator, TokenEstimator};

/// Tunables for one [`Executor`]. Everything has a safe, inert default so a
/// caller only sets the knobs it cares about.
#[derive(Clone)]
pub struct ExecutorConfig {
    pub checkpointer: Option<SharedCheckpointer>,
    pub event_bus: SharedEventBus,
    pub max_iterations: usize,
    pub interrupt_registry: InterruptRegistry,
    pub token_estimator: Arc<dyn TokenEstimator>,
    /// Overrides the agent's own tool registry for this execution (used by
    /// delegation to hand a filtered registry to a child executor).
    pub tools_override: Option<Arc<ToolRegistry>>,
    /// When true, a tool call is dispatched as soon as it is fully parsed
    /// off the stream rather than waiting for the stream to finish.
    pub speculative_tools: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            checkpointer: None,
            event_bus: Arc::new(NoopEventBus),
            max_iterations: 10,
            interrupt_registry: InterruptRegistry::new(),
            token_estimator: Arc::new(NoopEstimator),
            tools_override: None,
            speculative_tools: true,
        }
    }
}

/// One turn's worth of input plus the identity/correlation context carried
/// through every event and checkpoint this execution produces.
#[derive(Debug, Clone)]
pub struct ExecutorInput {
    pub messages: Vec<Message>,
    pub session_id: String,
    pub tenant_id: String,
    pub thread_id: Option<String>,
    pub trace_id: Option<String>,
    pub provider_continuity_token: Option<String>,
    pub is_resume: bool,
}

/// A caller-supplied answer to one interrupt question. `value` is raw JSON:
/// a string for single-select, an array of strings for multi-select.
#[derive(Debug, Clone)]
pub struct Answer {
    pub value: Value,
}

fn to_model_schema(s: courier_tools::ToolSchema) -> ModelToolSchema {
    ModelToolSchema { name: s.name, description: s.description, parameters: s.parameters }
}

fn render_structured(call_id: &str, result: ToolResult) -> ToolOutput {
    let text = serde_json::to_string_pretty(&result.payload)
        .unwrap_or_else(|_| result.payload.to_string());
    if result.artifacts.is_empty() {
        ToolOutput::ok(call_id, text)
    } else {
        let mut parts = vec![ToolOutputPart::Text(text)];
        parts.extend(result.artifacts);
        ToolOutput::with_parts(call_id, parts)
    }
}

type LockMap = Arc<AsyncMutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Drives one [`Agent`] through the ReAct loop against a [`ModelProvider`].
#[derive(Clone)]
pub struct Executor {
    agent: Arc<Agent>,
    model: Arc<dyn ModelProvider>,
    config: ExecutorConfig,
}

impl Executor {
    pub fn new(agent: Arc<Agent>, model: Arc<dyn ModelProvider>, config: ExecutorConfig) -> Self {
        Self { agent, model, config }
    }

    fn tools(&self) -> Arc<ToolRegistry> {
        self.config.tools_override.clone().unwrap_or_else(|| self.agent.tools.clone())
    }

    fn publish(&self, name: &'static str, ids: &EventIds, fields: Value) {
        self.config.event_bus.publish(ObservabilityEvent { name, ids: ids.clone(), fields });
    }

    fn ids(&self, input: &ExecutorInput) -> EventIds {
        EventIds {
            trace_id: input.trace_id.clone().unwrap_or_default(),
            session_id: input.session_id.clone(),
            tenant_id: input.tenant_id.clone(),
            agent_name: self.agent.name.clone(),
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Start a fresh execution. The producer does not run until the
    /// consumer calls `next()` on the returned sequence.
    pub fn execute(&self, input: ExecutorInput) -> LazySequence<ExecutorEvent> {
        let exec = self.clone();
        LazySequence::new(move |y| Box::pin(async move { exec.run(input, y).await }))
    }

    /// Load the checkpoint named by `checkpoint_id`, merge in `answers`, and
    /// start a new execution continuing from where the interrupt paused.
    /// The checkpoint is deleted atomically with the load, so a given
    /// checkpoint can be resumed at most once.
    pub async fn resume(
        &self,
        tenant_id: impl Into<String>,
        checkpoint_id: impl Into<String>,
        answers: HashMap<String, Answer>,
    ) -> Result<LazySequence<ExecutorEvent>, ExecutorError> {
        let tenant_id = tenant_id.into();
        let checkpoint_id = checkpoint_id.into();
        let checkpointer = self
            .config
            .checkpointer
            .clone()
            .ok_or_else(|| ExecutorError::Validation("resume requires a configured checkpointer".to_string()))?;

        let cp = checkpointer.load_and_delete(&tenant_id, &checkpoint_id).await.map_err(|e| match e {
            CheckpointError::NotFound(id) => ExecutorError::NotFound(id),
            CheckpointError::Storage(s) => ExecutorError::Transient(s),
        })?;

        if cp.interrupt_type != ASK_USER_QUESTION {
            return Err(ExecutorError::Validation(format!(
                "unsupported interrupt kind for resume: {}",
                cp.interrupt_type
            )));
        }

        let questions: Vec<InterruptQuestion> = serde_json::from_value(
            cp.interrupt_data.get("questions").cloned().unwrap_or(Value::Null),
        )
        .map_err(|e| ExecutorError::Validation(format!("corrupt checkpoint interrupt_data: {e}")))?;

        let mut answer_map = serde_json::Map::new();
        for q in &questions {
            let answer = answers
                .get(&q.id)
                .ok_or_else(|| ExecutorError::Validation(format!("missing answer for question {}", q.id)))?;
            answer_map.insert(q.id.clone(), answer.value.clone());
        }

        let pending = cp
            .pending_tools
            .first()
            .ok_or_else(|| ExecutorError::Validation("checkpoint has no pending tool call".to_string()))?;

        let mut messages = cp.messages.clone();
        messages.push(Message::tool_result(
            pending.id.clone(),
            Value::Object(answer_map).to_string(),
        ));

        let input = ExecutorInput {
            messages,
            session_id: cp.session_id.clone(),
            tenant_id: cp.tenant_id.clone(),
            thread_id: Some(cp.thread_id.clone()),
            trace_id: None,
            provider_continuity_token: cp.provider_continuity_token.clone(),
            is_resume: true,
        };
        Ok(self.execute(input))
    }

    async fn run(&self, input: ExecutorInput, y: Yielder<ExecutorEvent>) {
        let ids = self.ids(&input);
        self.publish("agent.start", &ids, Value::Null);
        match self.run_inner(input, &y).await {
            Ok(()) => {
                self.publish("agent.complete", &ids, Value::Null);
            }
            Err(err) => {
                self.publish("agent.error", &ids, serde_json::json!({"message": err.to_string()}));
                y.emit(ExecutorEvent::Error { message: err.to_string(), kind: err.kind().to_string() }).await;
                y.fail(anyhow::anyhow!(err.to_string())).await;
            }
        }
    }

    async fn run_inner(&self, input: ExecutorInput, y: &Yielder<ExecutorEvent>) -> Result<(), ExecutorError> {
        let ids = self.ids(&input);
        let mut messages = input.messages.clone();
        let tools = self.tools();
        let mut iteration = 0usize;
        let mut continuity_token = input.provider_continuity_token.clone();

        loop {
            iteration += 1;
            if iteration > self.config.max_iterations {
                return Err(ExecutorError::MaxIterations);
            }

            let estimated_tokens = self.config.token_estimator.estimate(&messages);
            self.publish(
                "llm.request",
                &ids,
                serde_json::json!({"iteration": iteration, "estimated_tokens": estimated_tokens}),
            );

            let req = CompletionRequest {
                messages: messages.clone(),
                tools: tools.schemas().into_iter().map(to_model_schema).collect(),
                stream: true,
                system_dynamic_suffix: None,
                provider_continuity_token: continuity_token.clone(),
            };
            let turn_start = std::time::Instant::now();
            let mut stream = self.model.complete(req).await.map_err(|e| ExecutorError::Transient(e.to_string()))?;

            let mut accumulated_text = String::new();
            let mut thinking_accum = String::new();
            let mut citations: Vec<Value> = Vec::new();
            let mut usage = UsageSummary::default();
            let mut tool_order: Vec<String> = Vec::new();
            let mut calls: HashMap<String, ToolCall> = HashMap::new();
            let mut interrupt_call: Option<ToolCall> = None;
            let mut launched: HashSet<String> = HashSet::new();
            let locks: LockMap = Arc::new(AsyncMutex::new(HashMap::new()));
            let mut pending: JoinSet<(String, ToolOutput)> = JoinSet::new();
            let emit_fn = self.make_emit_fn(y);

            while let Some(event) = stream.next().await {
                match event.map_err(|e| ExecutorError::Transient(e.to_string()))? {
                    ResponseEvent::TextDelta(delta) => {
                        accumulated_text.push_str(&delta);
                        y.emit(ExecutorEvent::Content { delta, accumulated: accumulated_text.clone() }).await;
                    }
                    ResponseEvent::ThinkingDelta(delta) => {
                        thinking_accum.push_str(&delta);
                        y.emit(ExecutorEvent::Thinking { delta }).await;
                    }
                    ResponseEvent::ToolCall { id, name, arguments } => {
                        let args: Value = serde_json::from_str(&arguments).unwrap_or(Value::Null);
                        if name == ASK_USER_QUESTION {
                            interrupt_call = Some(ToolCall { id, name, args });
                            pending.abort_all();
                            continue;
                        }
                        if !tool_order.contains(&id) {
                            tool_order.push(id.clone());
                        }
                        let call = ToolCall { id: id.clone(), name, args };
                        calls.insert(id.clone(), call.clone());

                        if self.config.speculative_tools && interrupt_call.is_none() && launched.insert(id.clone()) {
                            y.emit(ExecutorEvent::ToolStart {
                                call_id: id.clone(),
                                name: call.name.clone(),
                                agent_name: Some(self.agent.name.clone()),
                            })
                            .await;
                            self.publish("tool.start", &ids, serde_json::json!({"call_id": id, "name": call.name}));
                            let exec = self.clone();
                            let locks = locks.clone();
                            let emit = emit_fn.clone();
                            let call2 = call.clone();
                            pending.spawn(async move {
                                let out = exec.dispatch_one(&call2, locks, emit).await;
                                (call2.id, out)
                            });
                        }
                    }
                    ResponseEvent::Usage { input_tokens, output_tokens, cache_read_tokens, cache_write_tokens } => {
                        usage = UsageSummary { input_tokens, output_tokens, cache_read_tokens, cache_write_tokens };
                    }
                    ResponseEvent::Citations(c) => citations.extend(c),
                    ResponseEvent::ContinuityToken(token) => continuity_token = Some(token),
                    ResponseEvent::Done => break,
                    ResponseEvent::Error(message) => return Err(ExecutorError::Transient(message)),
                }
            }

            let finish_reason = if interrupt_call.is_some() {
                "interrupt"
            } else if tool_order.is_empty() {
                "stop"
            } else {
                "tool_calls"
            };
            self.publish(
                "llm.response",
                &ids,
                serde_json::json!({
                    "iteration": iteration,
                    "input_tokens": usage.input_tokens,
                    "output_tokens": usage.output_tokens,
                    "cache_read_tokens": usage.cache_read_tokens,
                    "cache_write_tokens": usage.cache_write_tokens,
                    "latency_ms": turn_start.elapsed().as_millis() as u64,
                    "finish_reason": finish_reason,
                    "tool_call_count": tool_order.len(),
                    "response_text": accumulated_text,
                    "thinking_text": thinking_accum,
                }),
            );

            if let Some(interrupt) = interrupt_call {
                while pending.join_next().await.is_some() {}
                return self
                    .handle_interrupt(interrupt, messages, accumulated_text, &continuity_token, &input, &ids, y)
                    .await;
            }

            if tool_order.is_empty() {
                y.emit(ExecutorEvent::Done {
                    content: accumulated_text.clone(),
                    finish_reason: "stop".to_string(),
                    usage,
                    citations: citations.clone(),
                    thinking: thinking_accum.clone(),
                })
                .await;
                return Ok(());
            }

            for id in &tool_order {
                if launched.insert(id.clone()) {
                    let call = calls.get(id).expect("every tool_order id has a call").clone();
                    y.emit(ExecutorEvent::ToolStart {
                        call_id: id.clone(),
                        name: call.name.clone(),
                        agent_name: Some(self.agent.name.clone()),
                    })
                    .await;
                    self.publish("tool.start", &ids, serde_json::json!({"call_id": id, "name": call.name}));
                    let exec = self.clone();
                    let locks = locks.clone();
                    let emit = emit_fn.clone();
                    pending.spawn(async move {
                        let out = exec.dispatch_one(&call, locks, emit).await;
                        (call.id, out)
                    });
                }
            }

            let mut outputs: HashMap<String, ToolOutput> = HashMap::new();
            while let Some(res) = pending.join_next().await {
                if let Ok((id, output)) = res {
                    outputs.insert(id, output);
                }
            }

            if !accumulated_text.is_empty() {
                let mut assistant_msg = Message::assistant(accumulated_text.clone());
                assistant_msg.citations = citations.clone();
                messages.push(assistant_msg);
            }
            for id in &tool_order {
                let call = &calls[id];
                messages.push(Message {
                    role: Role::Assistant,
                    content: MessageContent::ToolCall {
                        tool_call_id: id.clone(),
                        function: FunctionCall { name: call.name.clone(), arguments: call.args.to_string() },
                    },
                    citations: Vec::new(),
                });
            }

            let mut termination: Option<ToolOutput> = None;
            for id in &tool_order {
                let call = &calls[id];
                let output = outputs
                    .remove(id)
                    .unwrap_or_else(|| ToolOutput::err(id, "tool call was aborted before completion"));
                y.emit(ExecutorEvent::ToolEnd {
                    call_id: id.clone(),
                    name: call.name.clone(),
                    output: output.clone(),
                    agent_name: Some(self.agent.name.clone()),
                })
                .await;
                self.publish(
                    if output.is_error { "tool.error" } else { "tool.complete" },
                    &ids,
                    serde_json::json!({"call_id": id, "name": call.name}),
                );
                messages.push(Message::tool_result(id.clone(), output.content.clone()));
                if self.agent.is_termination_tool(&call.name) && termination.is_none() {
                    termination = Some(output);
                }
            }

            if let Some(output) = termination {
                y.emit(ExecutorEvent::Done {
                    content: output.content,
                    finish_reason: "tool".to_string(),
                    usage,
                    citations,
                    thinking: thinking_accum,
                })
                .await;
                return Ok(());
            }
        }
    }

    /// Bridge the async, backpressured [`Yielder::emit`] to the synchronous
    /// [`EmitFn`] signature required by streaming tools and delegation. Each
    /// invocation spawns a task that awaits the bounded channel, preserving
    /// backpressure without blocking the synchronous caller.
    fn make_emit_fn(&self, y: &Yielder<ExecutorEvent>) -> EmitFn {
        let y = y.clone();
        Arc::new(move |event: ExecutorEvent| {
            let y = y.clone();
            tokio::spawn(async move {
                y.emit(event).await;
            });
        })
    }

    /// Dispatch in capability-preference order: streaming, then structured
    /// (with stringify-on-no-formatter fallback), then a plain call, falling
    /// back to the agent's router when the tool isn't in this registry.
    async fn dispatch_one(&self, call: &ToolCall, locks: LockMap, emit: EmitFn) -> ToolOutput {
        let tool = self.tools().get(&call.name);
        let key = tool
            .as_ref()
            .and_then(|t| t.as_concurrency_keyed())
            .map(|k| k.concurrency_key(call))
            .filter(|k| !k.is_empty());

        let _guard = match &key {
            Some(key) => {
                let lock = {
                    let mut m = locks.lock().await;
                    m.entry(key.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
                };
                Some(lock.lock_owned().await)
            }
            None => None,
        };

        match tool {
            Some(tool) => {
                if let Some(streaming) = tool.as_streaming() {
                    streaming.execute_streaming(call, emit).await
                } else if let Some(structured) = tool.as_structured() {
                    match structured.execute_structured(call).await {
                        Ok(result) => render_structured(&call.id, result),
                        Err(courier_tools::StructuredToolOutput(result)) => render_structured(&call.id, result),
                    }
                } else {
                    tool.execute(call).await
                }
            }
            None => match self.agent.dispatch(call).await {
                Ok(out) => out,
                Err(e) => ToolOutput::err(&call.id, e.to_string()),
            },
        }
    }

    async fn handle_interrupt(
        &self,
        call: ToolCall,
        mut messages: Vec<Message>,
        accumulated_text: String,
        continuity_token: &Option<String>,
        input: &ExecutorInput,
        ids: &EventIds,
        y: &Yielder<ExecutorEvent>,
    ) -> Result<(), ExecutorError> {
        let handler = self
            .config
            .interrupt_registry
            .get(&call.name)
            .ok_or_else(|| ExecutorError::Validation(format!("no interrupt handler registered for {}", call.name)))?;
        let canonical = handler.canonicalize(&call.args)?;
        let questions: Vec<InterruptQuestion> =
            serde_json::from_value(canonical.get("questions").cloned().unwrap_or(Value::Null)).unwrap_or_default();

        if !accumulated_text.is_empty() {
            messages.push(Message::assistant(accumulated_text));
        }
        messages.push(Message {
            role: Role::Assistant,
            content: MessageContent::ToolCall {
                tool_call_id: call.id.clone(),
                function: FunctionCall { name: call.name.clone(), arguments: call.args.to_string() },
            },
            citations: Vec::new(),
        });

        let checkpointer = self
            .config
            .checkpointer
            .clone()
            .ok_or_else(|| ExecutorError::Validation("interrupt requires a configured checkpointer".to_string()))?;
        let thread_id = input.thread_id.clone().unwrap_or_else(|| input.session_id.clone());
        let checkpoint = Checkpoint {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id: thread_id.clone(),
            agent_name: self.agent.name.clone(),
            tenant_id: input.tenant_id.clone(),
            session_id: input.session_id.clone(),
            messages,
            pending_tools: vec![PendingToolCall::from(&call)],
            interrupt_type: call.name.clone(),
            interrupt_data: canonical.clone(),
            provider_continuity_token: continuity_token.clone(),
            created_at: chrono::Utc::now().timestamp_millis(),
        };
        let checkpoint_id = checkpointer
            .save(&input.tenant_id, checkpoint)
            .await
            .map_err(|e| ExecutorError::CheckpointSaveFailed(e.to_string()))?;

        self.publish("interrupt", ids, serde_json::json!({"kind": call.name, "checkpoint_id": checkpoint_id}));
        y.emit(ExecutorEvent::Interrupt(InterruptEvent {
            kind: call.name.clone(),
            payload: canonical,
            agent_name: self.agent.name.clone(),
            session_id: input.session_id.clone(),
            checkpoint_id: Some(checkpoint_id),
            questions,
        }))
        .await;
        Ok(())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use courier_model::ScriptedMockProvider;
    use courier_tools::builtin::concurrency_probe::{ConcurrencyCounter, ConcurrencyProbeTool};
    use courier_tools::builtin::{ask_question::AskQuestionTool, calc::CalcTool, search::SearchTool};
    use serde_json::json;

    use super::*;
    use crate::checkpoint::InMemoryCheckpointer;
    use crate::lazy_sequence::SequenceError;

    fn agent_with(tools: ToolRegistry) -> Arc<Agent> {
        Arc::new(Agent::new("main", "test agent", Arc::new(tools)))
    }

    fn base_input() -> ExecutorInput {
        ExecutorInput {
            messages: vec![Message::user("hello")],
            session_id: "sess-1".into(),
            tenant_id: "tenant-a".into(),
            thread_id: Some("thread-1".into()),
            trace_id: None,
            provider_continuity_token: None,
            is_resume: false,
        }
    }

    async fn drain(mut seq: LazySequence<ExecutorEvent>) -> Vec<ExecutorEvent> {
        let mut events = Vec::new();
        loop {
            match seq.next().await {
                Ok(ev) => events.push(ev),
                Err(SequenceError::Done) | Err(SequenceError::Closed) => break,
                Err(SequenceError::Other(e)) => panic!("sequence failed: {e}"),
            }
        }
        events
    }

    // S1 — single-turn, no tools.
    #[tokio::test]
    async fn s1_single_turn_no_tools_reports_content_and_usage() {
        let provider = ScriptedMockProvider::new(vec![vec![
            ResponseEvent::TextDelta("Hel".into()),
            ResponseEvent::TextDelta("lo ".into()),
            ResponseEvent::TextDelta("world".into()),
            ResponseEvent::TextDelta("!".into()),
            ResponseEvent::Usage { input_tokens: 10, output_tokens: 20, cache_read_tokens: 30, cache_write_tokens: 0 },
            ResponseEvent::Done,
        ]]);
        let executor = Executor::new(agent_with(ToolRegistry::new()), Arc::new(provider), ExecutorConfig::default());
        let events = drain(executor.execute(base_input())).await;

        match events.last().expect("at least one event") {
            ExecutorEvent::Done { content, finish_reason, usage, .. } => {
                assert_eq!(content, "Hello world!");
                assert_eq!(finish_reason, "stop");
                assert_eq!(usage.input_tokens, 10);
                assert_eq!(usage.output_tokens, 20);
                assert_eq!(usage.cache_read_tokens, 30);
            }
            other => panic!("expected Done, got {other:?}"),
        }
    }

    // S2 — two tools across two rounds, then a final text turn.
    #[tokio::test]
    async fn s2_two_tool_round_then_text() {
        let provider = ScriptedMockProvider::new(vec![
            vec![
                ResponseEvent::ToolCall { id: "c1".into(), name: "search".into(), arguments: json!({"query":"price"}).to_string() },
                ResponseEvent::ToolCall { id: "c2".into(), name: "calc".into(), arguments: json!({"expr":"1+1"}).to_string() },
                ResponseEvent::Done,
            ],
            vec![ResponseEvent::TextDelta("the answer is 2".into()), ResponseEvent::Done],
        ]);
        let mut tools = ToolRegistry::new();
        tools.register(SearchTool::new().with_entry("price", "$100"));
        tools.register(CalcTool);
        let executor = Executor::new(agent_with(tools), Arc::new(provider), ExecutorConfig::default());
        let events = drain(executor.execute(base_input())).await;

        let starts: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, ExecutorEvent::ToolStart { .. }))
            .collect();
        assert_eq!(starts.len(), 2);
        let ends: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                ExecutorEvent::ToolEnd { call_id, .. } => Some(call_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(ends, vec!["c1", "c2"], "tool-end events preserve original call order");
        match events.last().unwrap() {
            ExecutorEvent::Done { content, .. } => assert_eq!(content, "the answer is 2"),
            other => panic!("expected Done, got {other:?}"),
        }
    }

    // S3 — interrupt then resume.
    #[tokio::test]
    async fn s3_interrupt_then_resume_completes() {
        let ask_args = json!({
            "questions": [{
                "question": "Proceed?",
                "header": "Confirm",
                "multiSelect": false,
                "options": [
                    {"label": "Yes", "description": "Go ahead"},
                    {"label": "No", "description": "Stop"},
                ]
            }]
        });
        let provider = ScriptedMockProvider::new(vec![
            vec![
                ResponseEvent::ToolCall {
                    id: "ask-1".into(),
                    name: ASK_USER_QUESTION.into(),
                    arguments: ask_args.to_string(),
                },
                ResponseEvent::Done,
            ],
            vec![ResponseEvent::TextDelta("done".into()), ResponseEvent::Done],
        ]);
        let mut tools = ToolRegistry::new();
        tools.register(AskQuestionTool);
        let checkpointer = Arc::new(InMemoryCheckpointer::new());
        let config = ExecutorConfig { checkpointer: Some(checkpointer), ..ExecutorConfig::default() };
        let executor = Executor::new(agent_with(tools), Arc::new(provider), config);

        let events = drain(executor.execute(base_input())).await;
        let checkpoint_id = events
            .iter()
            .find_map(|e| match e {
                ExecutorEvent::Interrupt(ev) => ev.checkpoint_id.clone(),
                _ => None,
            })
            .expect("an interrupt with a checkpoint id");

        let mut answers = HashMap::new();
        answers.insert("q1".to_string(), Answer { value: json!("q1_opt1") });
        let resumed = executor.resume("tenant-a", checkpoint_id, answers).await.unwrap();
        let resumed_events = drain(resumed).await;
        match resumed_events.last().unwrap() {
            ExecutorEvent::Done { content, .. } => assert_eq!(content, "done"),
            other => panic!("expected Done after resume, got {other:?}"),
        }
    }

    // S4 — interrupt exclusivity: a sibling tool call in the same batch is
    // never dispatched once an ask_user_question is seen.
    #[tokio::test]
    async fn s4_interrupt_exclusivity_skips_sibling_tool() {
        let ask_args = json!({
            "questions": [{
                "question": "Proceed?",
                "header": "Confirm",
                "multiSelect": false,
                "options": [
                    {"label": "Yes", "description": "Go ahead"},
                    {"label": "No", "description": "Stop"},
                ]
            }]
        });
        let provider = ScriptedMockProvider::new(vec![vec![
            ResponseEvent::ToolCall { id: "c1".into(), name: "calc".into(), arguments: json!({"expr":"1+1"}).to_string() },
            ResponseEvent::ToolCall { id: "ask-1".into(), name: ASK_USER_QUESTION.into(), arguments: ask_args.to_string() },
            ResponseEvent::Done,
        ]]);
        let mut tools = ToolRegistry::new();
        tools.register(CalcTool);
        tools.register(AskQuestionTool);
        let checkpointer = Arc::new(InMemoryCheckpointer::new());
        let config = ExecutorConfig {
            checkpointer: Some(checkpointer),
            speculative_tools: false,
            ..ExecutorConfig::default()
        };
        let executor = Executor::new(agent_with(tools), Arc::new(provider), config);
        let events = drain(executor.execute(base_input())).await;

        assert!(!events.iter().any(|e| matches!(e, ExecutorEvent::ToolEnd { .. })));
        assert!(events.iter().any(|e| matches!(e, ExecutorEvent::Interrupt(_))));
    }

    // S5 — parallel tool dispatch reaches peak concurrency >= 2.
    #[tokio::test]
    async fn s5_parallel_tools_reach_peak_concurrency() {
        let counter = ConcurrencyCounter::new();
        let provider = ScriptedMockProvider::new(vec![
            vec![
                ResponseEvent::ToolCall { id: "a".into(), name: "proba".into(), arguments: "{}".into() },
                ResponseEvent::ToolCall { id: "b".into(), name: "probb".into(), arguments: "{}".into() },
                ResponseEvent::Done,
            ],
            vec![ResponseEvent::TextDelta("ok".into()), ResponseEvent::Done],
        ]);
        let mut tools = ToolRegistry::new();
        tools.register(ConcurrencyProbeTool::new("proba", Duration::from_millis(40), counter.clone()));
        tools.register(ConcurrencyProbeTool::new("probb", Duration::from_millis(40), counter.clone()));
        let executor = Executor::new(agent_with(tools), Arc::new(provider), ExecutorConfig::default());
        drain(executor.execute(base_input())).await;

        assert!(counter.peak() >= 2, "expected peak concurrency >= 2, got {}", counter.peak());
    }

    // S6 — max-iterations: a tool that always re-fires itself.
    #[tokio::test]
    async fn s6_max_iterations_after_five_tool_ends() {
        let scripts: Vec<Vec<ResponseEvent>> = (0..10)
            .map(|i| {
                vec![
                    ResponseEvent::ToolCall { id: format!("c{i}"), name: "loop_tool".into(), arguments: "{}".into() },
                    ResponseEvent::Done,
                ]
            })
            .collect();
        let provider = ScriptedMockProvider::new(scripts);
        let mut tools = ToolRegistry::new();
        tools.register(CalcTool); // placeholder so registry isn't empty
        tools.try_register(LoopTool).unwrap();
        let config = ExecutorConfig { max_iterations: 5, ..ExecutorConfig::default() };
        let executor = Executor::new(agent_with(tools), Arc::new(provider), config);
        let mut seq = executor.execute(base_input());

        let mut tool_ends = 0usize;
        let err = loop {
            match seq.next().await {
                Ok(ExecutorEvent::ToolEnd { .. }) => tool_ends += 1,
                Ok(_) => {}
                Err(SequenceError::Other(e)) => break e,
                Err(other) => panic!("expected a terminal error, got {other:?}"),
            }
        };
        assert_eq!(tool_ends, 5);
        assert!(err.to_string().contains("max iterations"));
    }

    struct LoopTool;

    #[async_trait::async_trait]
    impl Tool for LoopTool {
        fn name(&self) -> &str {
            "loop_tool"
        }
        fn description(&self) -> &str {
            "always succeeds; used to exercise the iteration cap"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, call: &ToolCall) -> ToolOutput {
            ToolOutput::ok(&call.id, "looping")
        }
    }

    // Invariant: a termination tool ends the loop with its output as the
    // final content, without a further model round-trip.
    #[tokio::test]
    async fn termination_tool_ends_loop_with_its_output() {
        let provider = ScriptedMockProvider::new(vec![vec![
            ResponseEvent::ToolCall { id: "f1".into(), name: "final_answer".into(), arguments: "{}".into() },
            ResponseEvent::Done,
        ]]);
        let mut tools = ToolRegistry::new();
        tools.try_register(FinalAnswerTool).unwrap();
        let agent = Arc::new(
            Agent::new("main", "d", Arc::new(tools)).with_metadata(crate::agent::AgentMetadata {
                termination_tools: vec!["final_answer".to_string()],
                ..Default::default()
            }),
        );
        let executor = Executor::new(agent, Arc::new(provider), ExecutorConfig::default());
        let events = drain(executor.execute(base_input())).await;
        match events.last().unwrap() {
            ExecutorEvent::Done { content, finish_reason, .. } => {
                assert_eq!(content, "final!");
                assert_eq!(finish_reason, "tool");
            }
            other => panic!("expected Done, got {other:?}"),
        }
    }

    struct FinalAnswerTool;

    #[async_trait::async_trait]
    impl Tool for FinalAnswerTool {
        fn name(&self) -> &str {
            "final_answer"
        }
        fn description(&self) -> &str {
            "ends the loop"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, call: &ToolCall) -> ToolOutput {
            ToolOutput::ok(&call.id, "final!")
        }
    }

    // Invariant: a tool execution error is surfaced as a normal tool
    // response, not an executor-level Error event.
    #[tokio::test]
    async fn tool_execution_error_does_not_abort_the_iteration() {
        let provider = ScriptedMockProvider::new(vec![
            vec![
                ResponseEvent::ToolCall { id: "c1".into(), name: "missing".into(), arguments: "{}".into() },
                ResponseEvent::Done,
            ],
            vec![ResponseEvent::TextDelta("recovered".into()), ResponseEvent::Done],
        ]);
        let executor = Executor::new(agent_with(ToolRegistry::new()), Arc::new(provider), ExecutorConfig::default());
        let events = drain(executor.execute(base_input())).await;
        assert!(!events.iter().any(|e| matches!(e, ExecutorEvent::Error { .. })));
        match events.last().unwrap() {
            ExecutorEvent::Done { content, .. } => assert_eq!(content, "recovered"),
            other => panic!("expected Done, got {other:?}"),
        }
    }
}
