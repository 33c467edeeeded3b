//! # ChatDB Core
//!
//! Runtime-agnostic logic for ChatDB: the data model of a query request,
//! prompt assembly, sanitizing of generated text, the restricted-literal
//! parser that turns that text into a [`models::StructuredQuery`], routing,
//! result materialization, and the document store abstraction together
//! with the query engine that evaluates filters, pipelines, and updates.
//!
//! This crate contains no tokio, sqlx, or network dependencies. Native
//! backends live in the `chatdb` crate and implement [`store::DocumentStore`].
//!
//! ## Request flow
//!
//! ```text
//! SchemaSummary ─▶ prompt::assemble_prompt ─▶ (generation) ─▶ sanitize::sanitize
//!                                                                  │
//!          executor / relational ◀─ router::route ◀─ parser::parse_query
//!                   │
//!                   ▼
//!          materialize ─▶ QueryOutcome
//! ```

pub mod engine;
pub mod error;
pub mod executor;
pub mod literal;
pub mod materialize;
pub mod models;
pub mod parser;
pub mod prompt;
pub mod router;
pub mod sanitize;
pub mod store;

pub use error::PipelineError;
pub use models::{
    Document, ExecutionResult, GenerationPrompt, MutationSummary, QueryOutcome, SchemaSummary,
    StatementError, StatementReport, StoreKind, StructuredQuery, Table,
};
