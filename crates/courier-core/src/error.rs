// Copyright (c) 2024-2026 The Courier Authors
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

/// The error kinds an executor surfaces. Transient/Permanent distinguish
/// what a caller's retry middleware should do; the rest are terminal.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Malformed tool arguments, malformed resume answers, or an invalid
    /// interrupt payload shape. Carries a `path: reason`-style message.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown agent, unknown tool, or unknown checkpoint.
    #[error("not found: {0}")]
    NotFound(String),

    /// Provider I/O errors or rate-limit signals. Callers may wrap calls in
    /// retry middleware; the core does not retry on its own.
    #[error("transient error: {0}")]
    Transient(String),

    /// Max iterations exceeded, or a checkpoint save failed.
    #[error("max iterations exceeded")]
    MaxIterations,

    #[error("checkpoint save failed: {0}")]
    CheckpointSaveFailed(String),

    /// Context was cancelled mid-execution.
    #[error("execution cancelled")]
    Cancelled,
}

impl ExecutorError {
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutorError::Validation(_) => "Validation",
            ExecutorError::NotFound(_) => "NotFound",
            ExecutorError::Transient(_) => "Transient",
            ExecutorError::MaxIterations => "MaxIterations",
            ExecutorError::CheckpointSaveFailed(_) => "Permanent",
            ExecutorError::Cancelled => "Cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_match_spec_taxonomy() {
        assert_eq!(ExecutorError::Validation("x".into()).kind(), "Validation");
        assert_eq!(ExecutorError::NotFound("x".into()).kind(), "NotFound");
        assert_eq!(ExecutorError::Transient("x".into()).kind(), "Transient");
        assert_eq!(ExecutorError::MaxIterations.kind(), "MaxIterations");
        assert_eq!(ExecutorError::CheckpointSaveFailed("x".into()).kind(), "Permanent");
        assert_eq!(ExecutorError::Cancelled.kind(), "Cancelled");
    }
}
