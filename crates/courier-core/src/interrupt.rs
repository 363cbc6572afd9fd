// Copyright (c) 2024-2026 The Courier Authors
//
// SPDX-License-Identifier: MIT
//! Interrupt Handler Registry: a typed dispatch table mapping interrupt
//! kind to handler, pre-seeded with the built-in `ask_user_question` kind.
//! Also hosts canonicalization and validation of that kind's payload, since
//! the Executor treats it as a special case of tool name rather than a
//! normal dispatch target.
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use courier_tools::{InterruptOption, InterruptQuestion};
use serde_json::Value;

use crate::error::ExecutorError;

pub const ASK_USER_QUESTION: &str = "ask_user_question";

/// A handler reacts to one interrupt kind by canonicalizing its raw
/// tool-call arguments into a validated JSON payload.
pub trait InterruptHandler: Send + Sync {
    fn canonicalize(&self, raw_args: &Value) -> Result<Value, ExecutorError>;
}

/// Canonicalizes and validates `ask_user_question` arguments against the
/// schema in the interface contract: generates missing question/option ids,
/// enforces question/option count bounds, non-empty strings, and id
/// uniqueness.
pub struct AskUserQuestionHandler;

impl InterruptHandler for AskUserQuestionHandler {
    fn canonicalize(&self, raw_args: &Value) -> Result<Value, ExecutorError> {
        let questions = canonicalize_questions(raw_args)?;
        let mut payload = serde_json::Map::new();
        payload.insert("type".to_string(), Value::String(ASK_USER_QUESTION.to_string()));
        payload.insert(
            "questions".to_string(),
            serde_json::to_value(&questions).expect("InterruptQuestion always serializes"),
        );
        if let Some(metadata) = raw_args.get("metadata") {
            payload.insert("metadata".to_string(), metadata.clone());
        }
        Ok(Value::Object(payload))
    }
}

fn canonicalize_questions(raw_args: &Value) -> Result<Vec<InterruptQuestion>, ExecutorError> {
    let raw_questions = raw_args
        .get("questions")
        .and_then(Value::as_array)
        .ok_or_else(|| ExecutorError::Validation("questions: must be a non-empty array".to_string()))?;

    if raw_questions.is_empty() || raw_questions.len() > 4 {
        return Err(ExecutorError::Validation(
            "questions: must contain 1..4 items".to_string(),
        ));
    }

    let mut seen_question_ids = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(raw_questions.len());

    for (i, raw_q) in raw_questions.iter().enumerate() {
        let id = match raw_q.get("id").and_then(Value::as_str) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => format!("q{}", i + 1),
        };
        if !seen_question_ids.insert(id.clone()) {
            return Err(ExecutorError::Validation(format!(
                "question[{i}]: duplicate question id {id}"
            )));
        }

        let question = raw_q
            .get("question")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ExecutorError::Validation(format!("question[{i}]: question must be non-empty")))?
            .to_string();

        let header = raw_q
            .get("header")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if header.is_empty() || header.chars().count() > 50 {
            return Err(ExecutorError::Validation(format!(
                "question[{i}]: header must be 1..50 characters"
            )));
        }

        let multi_select = raw_q
            .get("multiSelect")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let raw_options = raw_q
            .get("options")
            .and_then(Value::as_array)
            .ok_or_else(|| ExecutorError::Validation(format!("question[{i}]: options must be an array")))?;
        if raw_options.len() < 2 || raw_options.len() > 4 {
            return Err(ExecutorError::Validation(format!(
                "question[{i}]: options must contain 2..4 items"
            )));
        }

        let mut seen_option_ids = std::collections::HashSet::new();
        let mut options = Vec::with_capacity(raw_options.len());
        for (j, raw_opt) in raw_options.iter().enumerate() {
            let opt_id = match raw_opt.get("id").and_then(Value::as_str) {
                Some(s) if !s.is_empty() => s.to_string(),
                _ => format!("{id}_opt{}", j + 1),
            };
            if !seen_option_ids.insert(opt_id.clone()) {
                return Err(ExecutorError::Validation(format!(
                    "question[{i}].option[{j}]: duplicate option id {opt_id}"
                )));
            }
            let label = raw_opt
                .get("label")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    ExecutorError::Validation(format!("question[{i}].option[{j}]: label must be non-empty"))
                })?
                .to_string();
            let description = raw_opt
                .get("description")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    ExecutorError::Validation(format!(
                        "question[{i}].option[{j}]: description must be non-empty"
                    ))
                })?
                .to_string();
            options.push(InterruptOption { id: opt_id, label, description });
        }

        out.push(InterruptQuestion { id, question, header, multi_select, options });
    }

    Ok(out)
}

/// Thread-safe kind → handler map. `register` idempotently replaces any
/// existing handler for the same kind.
#[derive(Clone)]
pub struct InterruptRegistry {
    handlers: Arc<RwLock<HashMap<String, Arc<dyn InterruptHandler>>>>,
}

impl Default for InterruptRegistry {
    fn default() -> Self {
        let mut handlers: HashMap<String, Arc<dyn InterruptHandler>> = HashMap::new();
        handlers.insert(ASK_USER_QUESTION.to_string(), Arc::new(AskUserQuestionHandler));
        Self { handlers: Arc::new(RwLock::new(handlers)) }
    }
}

impl InterruptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, kind: impl Into<String>, handler: Arc<dyn InterruptHandler>) {
        self.handlers.write().unwrap().insert(kind.into(), handler);
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn InterruptHandler>> {
        self.handlers.read().unwrap().get(kind).cloned()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
