// Copyright (c) 2024-2026 The Courier Authors
//
// SPDX-License-Identifier: MIT
pub mod builtin;
pub mod events;
pub mod registry;
pub mod schema;
pub mod tool;

pub use events::{ExecutorEvent, InterruptEvent, InterruptOption, InterruptQuestion, UsageSummary};
pub use registry::{ToolRegistry, ToolSchema};
pub use schema::schema_for;
pub use tool::{
    ConcurrencyKeyedTool, EmitFn, StreamingTool, StructuredTool, StructuredToolOutput, Tool,
    ToolCall, ToolOutput, ToolOutputPart, ToolResult,
};

pub use builtin::ask_question::AskQuestionTool;
pub use builtin::calc::CalcTool;
pub use builtin::concurrency_probe::{ConcurrencyCounter, ConcurrencyProbeTool};
pub use builtin::search::SearchTool;
