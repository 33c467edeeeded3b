//! Error taxonomy for a query request.
//!
//! Every variant except [`PipelineError::ExecutionError`] is fatal for the
//! request: nothing is executed once one of them is raised. Execution errors
//! of individual relational statements are recorded per statement instead
//! (see [`crate::models::StatementError`]); this variant is used when an
//! operation fails as a whole. Nothing is ever retried.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// The target database could not be reached or enumerated.
    #[error("schema unavailable for '{target}': {message}")]
    SchemaUnavailable { target: String, message: String },

    /// The generation provider failed or returned no text.
    #[error("generation failed: {0}")]
    GenerationFailed(String),

    /// Nothing was left of the generated text after sanitizing.
    #[error("no query payload left after removing prose and markup")]
    EmptyPayload,

    /// The payload contains something other than data literals.
    #[error("unsafe payload rejected ({reason}):\n{payload}")]
    UnsafePayload { payload: String, reason: String },

    /// The payload is not a query of any supported shape.
    #[error("payload does not match a supported query shape ({reason}):\n{payload}")]
    ShapeMismatch { payload: String, reason: String },

    /// A statement or operation was rejected by the backend.
    #[error("execution failed: {message}\n  {statement}")]
    ExecutionError { statement: String, message: String },
}

impl PipelineError {
    pub fn schema_unavailable(target: &str, message: impl ToString) -> Self {
        PipelineError::SchemaUnavailable {
            target: target.to_string(),
            message: message.to_string(),
        }
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::SchemaUnavailable { .. } => "schema_unavailable",
            PipelineError::GenerationFailed(_) => "generation_failed",
            PipelineError::EmptyPayload => "empty_payload",
            PipelineError::UnsafePayload { .. } => "unsafe_payload",
            PipelineError::ShapeMismatch { .. } => "shape_mismatch",
            PipelineError::ExecutionError { .. } => "execution_error",
        }
    }
}
