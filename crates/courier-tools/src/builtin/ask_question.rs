// Copyright (c) 2024-2026 The Courier Authors
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tool::{Tool, ToolCall, ToolOutput};

/// Reserved tool name: `ask_user_question` triggers the executor's interrupt
/// path instead of ordinary dispatch.
pub const NAME: &str = "ask_user_question";

/// The `ask_user_question` tool declaration. Its `execute` is never reached
/// in normal operation — the executor recognizes this tool name ahead of
/// dispatch and raises an interrupt, validating and canonicalizing the call
/// arguments against this same schema (minus the `type` discriminant) before
/// checkpointing and suspending. `execute` exists only so the tool still
/// behaves sensibly if invoked outside that path.
pub struct AskQuestionTool;

#[async_trait]
impl Tool for AskQuestionTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Ask the user one or more structured multiple-choice questions and \
         pause execution until they are answered. Each question has a \
         short header, the question text, 2-4 options (each with a label \
         and description), and whether multiple options may be selected."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "questions": {
                    "type": "array",
                    "minItems": 1,
                    "maxItems": 4,
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": {
                                "type": "string",
                                "description": "Unique id for this question; generated as q{n} if omitted"
                            },
                            "question": {
                                "type": "string",
                                "description": "The question text, non-empty"
                            },
                            "header": {
                                "type": "string",
                                "description": "Short label for the question, 1-50 characters"
                            },
                            "multiSelect": {
                                "type": "boolean",
                                "description": "Whether more than one option may be selected"
                            },
                            "options": {
                                "type": "array",
                                "minItems": 2,
                                "maxItems": 4,
                                "items": {
                                    "type": "object",
                                    "properties": {
                                        "id": {
                                            "type": "string",
                                            "description": "Unique id for this option; generated as {qid}_opt{n} if omitted"
                                        },
                                        "label": { "type": "string" },
                                        "description": { "type": "string" }
                                    },
                                    "required": ["label", "description"],
                                    "additionalProperties": false
                                }
                            }
                        },
                        "required": ["question", "header", "multiSelect", "options"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["questions"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        ToolOutput::err(
            &call.id,
            "ask_user_question must be intercepted as an interrupt before dispatch; \
             it should never reach Tool::execute",
        )
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_matches_reserved_constant() {
        assert_eq!(AskQuestionTool.name(), NAME);
        assert_eq!(NAME, "ask_user_question");
    }

    #[test]
    fn schema_requires_questions_array() {
        let schema = AskQuestionTool.parameters_schema();
        let required = schema["required"].as_array().unwrap();
        assert!(required.iter().any(|v| v == "questions"));
    }

    #[test]
    fn schema_bounds_question_count_one_to_four() {
        let schema = AskQuestionTool.parameters_schema();
        let questions = &schema["properties"]["questions"];
        assert_eq!(questions["minItems"], 1);
        assert_eq!(questions["maxItems"], 4);
    }

    #[test]
    fn schema_bounds_option_count_two_to_four() {
        let schema = AskQuestionTool.parameters_schema();
        let options = &schema["properties"]["questions"]["items"]["properties"]["options"];
        assert_eq!(options["minItems"], 2);
        assert_eq!(options["maxItems"], 4);
    }

    #[tokio::test]
    async fn direct_execute_is_always_an_error() {
        let call = ToolCall { id: "c1".into(), name: NAME.into(), args: json!({}) };
        let out = AskQuestionTool.execute(&call).await;
        assert!(out.is_error);
        assert!(out.content.contains("intercepted"));
    }
}
