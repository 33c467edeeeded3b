//! Running document-store queries.
//!
//! [`DocumentExecutor`] has one entry point per document query shape. Each
//! operation either succeeds as a whole or fails with
//! [`PipelineError::ExecutionError`] carrying the attempted call and the
//! backend's message.

use serde::Serialize;

use crate::error::PipelineError;
use crate::materialize::documents_to_table;
use crate::models::{Document, ExecutionResult, MutationSummary};
use crate::router::ExecutionStrategy;
use crate::store::DocumentStore;

fn pretty(value: &impl Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "<unprintable>".to_string())
}

/// `db['<container>'].<method>(<args>)`, as shown to users.
fn call_text(container: &str, method: &str, args: &[String]) -> String {
    format!("db['{}'].{}({})", container, method, args.join(", "))
}

pub struct DocumentExecutor<'s> {
    store: &'s dyn DocumentStore,
}

impl<'s> DocumentExecutor<'s> {
    pub fn new(store: &'s dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Documents matching `filter`, tabulated.
    pub async fn find(
        &self,
        container: &str,
        filter: &Document,
    ) -> Result<ExecutionResult, PipelineError> {
        match self.store.find(container, filter).await {
            Ok(docs) => Ok(ExecutionResult::Table(documents_to_table(docs))),
            Err(e) => Err(PipelineError::ExecutionError {
                statement: call_text(container, "find", &[pretty(filter)]),
                message: format!("{:#}", e),
            }),
        }
    }

    /// Pipeline output documents, tabulated.
    pub async fn aggregate(
        &self,
        container: &str,
        stages: &[Document],
    ) -> Result<ExecutionResult, PipelineError> {
        match self.store.aggregate(container, stages).await {
            Ok(docs) => Ok(ExecutionResult::Table(documents_to_table(docs))),
            Err(e) => Err(PipelineError::ExecutionError {
                statement: call_text(container, "aggregate", &[pretty(&stages)]),
                message: format!("{:#}", e),
            }),
        }
    }

    /// Multi-document update. The summary carries the modified count.
    pub async fn update(
        &self,
        container: &str,
        filter: &Document,
        update: &Document,
    ) -> Result<ExecutionResult, PipelineError> {
        match self.store.update_many(container, filter, update).await {
            Ok(summary) => Ok(ExecutionResult::Mutation(MutationSummary {
                affected: Some(summary.modified),
            })),
            Err(e) => Err(PipelineError::ExecutionError {
                statement: call_text(container, "update_many", &[pretty(filter), pretty(update)]),
                message: format!("{:#}", e),
            }),
        }
    }

    /// Dispatch a routed document query.
    pub async fn execute(
        &self,
        strategy: ExecutionStrategy<'_>,
    ) -> Result<ExecutionResult, PipelineError> {
        match strategy {
            ExecutionStrategy::Find { container, filter } => self.find(container, filter).await,
            ExecutionStrategy::Aggregate { container, stages } => {
                self.aggregate(container, stages).await
            }
            ExecutionStrategy::Update {
                container,
                filter,
                update,
            } => self.update(container, filter, update).await,
            ExecutionStrategy::Relational { statements } => Err(PipelineError::ShapeMismatch {
                payload: statements.join(";\n"),
                reason: "SQL statements cannot run against a document store".to_string(),
            }),
        }
    }
}
