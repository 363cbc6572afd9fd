// Copyright (c) 2024-2026 The Courier Authors
//
// SPDX-License-Identifier: MIT
//! Agent metadata and the agent registry. An agent is a named bundle of
//! tools, a model preference, and termination rules; the Executor drives
//! one agent per execution (nested, for delegation).
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use courier_tools::{Tool, ToolCall, ToolOutput, ToolRegistry};

use crate::error::ExecutorError;

/// Advisory metadata surfaced to callers and to a router deciding which
/// agent to delegate to.
#[derive(Debug, Clone, Default)]
pub struct AgentMetadata {
    /// One-line description of when to prefer this agent for delegation.
    pub when_to_use: String,
    /// Preferred model name, if the agent pins one (otherwise the caller's
    /// default model is used).
    pub model_name: Option<String>,
    /// Tool names whose successful invocation ends the iteration loop with
    /// that tool's output as the final assistant content.
    pub termination_tools: Vec<String>,
}

/// Routing hook invoked only when a tool-call name is not found in the
/// agent's own registry — lets an agent handle ad hoc or dynamically
/// generated tool names without registering each one up front.
#[async_trait]
pub trait ToolCallRouter: Send + Sync {
    async fn route(&self, name: &str, call: &ToolCall) -> Result<ToolOutput, ExecutorError>;
}

/// An agent: a name, description, declared tools, and behavior metadata.
pub struct Agent {
    pub name: String,
    pub description: String,
    pub metadata: AgentMetadata,
    pub tools: Arc<ToolRegistry>,
    system_prompt: Box<dyn Fn() -> String + Send + Sync>,
    router: Option<Arc<dyn ToolCallRouter>>,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            metadata: AgentMetadata::default(),
            tools,
            system_prompt: Box::new(String::new),
            router: None,
        }
    }

    pub fn with_metadata(mut self, metadata: AgentMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_system_prompt<F>(mut self, f: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.system_prompt = Box::new(f);
        self
    }

    pub fn with_router(mut self, router: Arc<dyn ToolCallRouter>) -> Self {
        self.router = Some(router);
        self
    }

    /// Render this agent's system prompt. Context-dependent agents pass
    /// the current time, project state, etc. via the closure's captures.
    pub fn system_prompt(&self) -> String {
        (self.system_prompt)()
    }

    /// Look up a tool's declared handler, falling back to `onToolCall`
    /// routing when the name is not registered directly.
    pub async fn dispatch(&self, call: &ToolCall) -> Result<ToolOutput, ExecutorError> {
        if let Some(tool) = self.tools.get(&call.name) {
            return Ok(tool.execute(call).await);
        }
        if let Some(router) = &self.router {
            return router.route(&call.name, call).await;
        }
        Err(ExecutorError::NotFound(format!("tool {} is not registered", call.name)))
    }

    pub fn is_termination_tool(&self, name: &str) -> bool {
        self.metadata.termination_tools.iter().any(|t| t == name)
    }
}

/// Thread-safe name → Agent map with duplicate-detection on insert.
#[derive(Default)]
pub struct AgentRegistry {
    agents: RwLock<HashMap<String, Arc<Agent>>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, agent: Agent) {
        self.agents.write().unwrap().insert(agent.name.clone(), Arc::new(agent));
    }

    /// Register only if no agent with this name already exists.
    pub fn try_register(&self, agent: Agent) -> Result<(), ExecutorError> {
        let mut agents = self.agents.write().unwrap();
        if agents.contains_key(&agent.name) {
            return Err(ExecutorError::Validation(format!(
                "agent {} is already registered",
                agent.name
            )));
        }
        agents.insert(agent.name.clone(), Arc::new(agent));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Agent>> {
        self.agents.read().unwrap().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.agents.read().unwrap().keys().cloned().collect()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use courier_tools::builtin::search::SearchTool;
    use serde_json::{json, Value};

    fn empty_registry() -> Arc<ToolRegistry> {
        Arc::new(ToolRegistry::new())
    }

    #[test]
    fn agent_default_system_prompt_is_empty() {
        let agent = Agent::new("main", "the main agent", empty_registry());
        assert_eq!(agent.system_prompt(), "");
    }

    #[test]
    fn agent_with_system_prompt_renders_closure() {
        let agent = Agent::new("main", "the main agent", empty_registry())
            .with_system_prompt(|| "you are helpful".to_string());
        assert_eq!(agent.system_prompt(), "you are helpful");
    }

    #[test]
    fn is_termination_tool_checks_metadata_list() {
        let agent = Agent::new("main", "d", empty_registry()).with_metadata(AgentMetadata {
            termination_tools: vec!["final_answer".to_string()],
            ..Default::default()
        });
        assert!(agent.is_termination_tool("final_answer"));
        assert!(!agent.is_termination_tool("search"));
    }

    #[tokio::test]
    async fn dispatch_finds_registered_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(SearchTool::new().with_entry("price", "$100")));
        let agent = Agent::new("main", "d", Arc::new(registry));
        let call = ToolCall { id: "c1".into(), name: "search".into(), args: json!({"query": "price"}) };
        let out = agent.dispatch(&call).await.unwrap();
        assert_eq!(out.content, "$100");
    }

    #[tokio::test]
    async fn dispatch_unknown_tool_without_router_is_not_found() {
        let agent = Agent::new("main", "d", empty_registry());
        let call = ToolCall { id: "c1".into(), name: "nope".into(), args: Value::Null };
        let err = agent.dispatch(&call).await.unwrap_err();
        assert!(matches!(err, ExecutorError::NotFound(_)));
    }

    struct EchoRouter;

    #[async_trait]
    impl ToolCallRouter for EchoRouter {
        async fn route(&self, name: &str, call: &ToolCall) -> Result<ToolOutput, ExecutorError> {
            Ok(ToolOutput::ok(&call.id, format!("routed:{name}")))
        }
    }

    #[tokio::test]
    async fn dispatch_falls_back_to_router_when_unregistered() {
        let agent = Agent::new("main", "d", empty_registry()).with_router(Arc::new(EchoRouter));
        let call = ToolCall { id: "c1".into(), name: "dynamic".into(), args: Value::Null };
        let out = agent.dispatch(&call).await.unwrap();
        assert_eq!(out.content, "routed:dynamic");
        assert!(!out.is_error);
    }

    #[test]
    fn registry_try_register_rejects_duplicate_name() {
        let registry = AgentRegistry::new();
        registry.try_register(Agent::new("main", "d1", empty_registry())).unwrap();
        let err = registry.try_register(Agent::new("main", "d2", empty_registry())).unwrap_err();
        assert!(matches!(err, ExecutorError::Validation(_)));
    }

    #[test]
    fn registry_get_and_names() {
        let registry = AgentRegistry::new();
        registry.register(Agent::new("main", "d", empty_registry()));
        registry.register(Agent::new("helper", "d2", empty_registry()));
        assert!(registry.get("main").is_some());
        assert!(registry.get("missing").is_none());
        let mut names = registry.names();
        names.sort();
        assert_eq!(names, vec!["helper".to_string(), "main".to_string()]);
    }
}
