// Copyright (c) 2024-2026 The Courier Authors
//
// SPDX-License-Identifier: MIT
//! Agent execution core: a streaming ReAct loop over a pluggable model
//! provider and tool registry, with human-in-the-loop interrupts,
//! checkpoint/resume, and subagent delegation.
mod agent;
mod checkpoint;
mod delegation;
mod error;
mod executor;
mod interrupt;
mod lazy_sequence;
mod observability;
mod token;

pub use agent::{Agent, AgentMetadata, AgentRegistry, ToolCallRouter};
pub use checkpoint::{
    Checkpoint, CheckpointError, Checkpointer, InMemoryCheckpointer, SharedCheckpointer,
    SqliteCheckpointer,
};
pub use delegation::{DelegationTool, PendingToolCall, DELEGATION_TOOL_NAME};
pub use error::ExecutorError;
pub use executor::{Answer, Executor, ExecutorConfig, ExecutorInput};
pub use interrupt::{AskUserQuestionHandler, InterruptHandler, InterruptRegistry, ASK_USER_QUESTION};
pub use lazy_sequence::{LazySequence, SequenceError, Yielder};
pub use observability::{EventBus, EventIds, NoopEventBus, ObservabilityEvent, SharedEventBus, TracingEventBus};
pub use token::{HeuristicEstimator, NoopEstimator, TokenEstimator};
