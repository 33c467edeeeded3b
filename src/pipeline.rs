//! The request pipeline.
//!
//! One request runs these stages strictly in order, each finishing before
//! the next starts:
//!
//! ```text
//! introspect ─▶ assemble prompt ─▶ generate ─▶ sanitize ─▶ parse ─▶ route ─▶ execute ─▶ materialize
//! ```
//!
//! [`Pipeline::ask`] runs all of them. [`Pipeline::run_payload`] starts at
//! the sanitizer with text supplied by the caller. Any error before
//! execution is fatal for the request and nothing is executed. Execution
//! failures are part of the returned [`QueryOutcome`].
//!
//! Database connections are opened per request and closed before the
//! request returns, on success and error alike.

use serde::Serialize;

use chatdb_core::executor::DocumentExecutor;
use chatdb_core::literal::render_query;
use chatdb_core::materialize::{materialize_document, materialize_statements};
use chatdb_core::models::SanitizedPayload;
use chatdb_core::parser::parse_query;
use chatdb_core::prompt::assemble_prompt;
use chatdb_core::router::{route, ExecutionStrategy};
use chatdb_core::sanitize::sanitize;
use chatdb_core::{
    GenerationPrompt, PipelineError, QueryOutcome, SchemaSummary, StoreKind, StructuredQuery,
};

use crate::config::Config;
use crate::db;
use crate::document_store::SqliteDocumentStore;
use crate::generation::GenerationProvider;
use crate::introspect::SchemaIntrospector;
use crate::relational::RelationalExecutor;

/// Everything up to (not including) execution.
#[derive(Debug, Clone, Serialize)]
pub struct CompiledQuery {
    pub store: StoreKind,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<GenerationPrompt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
    pub payload: SanitizedPayload,
    pub query: StructuredQuery,
    /// The query in the store's call syntax, e.g. `db['c'].find({...})`.
    pub display: String,
    /// The query in the literal grammar accepted by the parser.
    pub literal: String,
}

/// A finished request.
#[derive(Debug, Clone, Serialize)]
pub struct QueryReport {
    #[serde(flatten)]
    pub compiled: CompiledQuery,
    pub outcome: QueryOutcome,
}

impl QueryReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

pub struct Pipeline<'c> {
    config: &'c Config,
    provider: Box<dyn GenerationProvider>,
}

impl<'c> Pipeline<'c> {
    pub fn new(config: &'c Config, provider: Box<dyn GenerationProvider>) -> Self {
        Self { config, provider }
    }

    pub async fn schema(&self, kind: StoreKind, target: &str) -> Result<SchemaSummary, PipelineError> {
        SchemaIntrospector::new(self.config).introspect(kind, target).await
    }

    pub async fn prompt(
        &self,
        kind: StoreKind,
        target: &str,
        request: &str,
    ) -> Result<GenerationPrompt, PipelineError> {
        let schema = self.schema(kind, target).await?;
        Ok(assemble_prompt(&schema, kind, request))
    }

    /// Introspect, prompt, generate, sanitize and parse. Executes nothing.
    pub async fn compile(
        &self,
        kind: StoreKind,
        target: &str,
        request: &str,
    ) -> Result<CompiledQuery, PipelineError> {
        let schema = self.schema(kind, target).await?;
        let prompt = assemble_prompt(&schema, kind, request);
        tracing::debug!(
            model = self.provider.model_name(),
            chars = prompt.as_str().len(),
            "generating"
        );

        let raw = self
            .provider
            .generate(&prompt)
            .await
            .map_err(|e| PipelineError::GenerationFailed(format!("{:#}", e)))?;

        let mut compiled = compile_text(kind, target, &raw)?;
        compiled.schema = Some(schema);
        compiled.prompt = Some(prompt);
        compiled.raw_text = Some(raw);
        Ok(compiled)
    }

    /// Full request: natural language in, outcome out.
    pub async fn ask(
        &self,
        kind: StoreKind,
        target: &str,
        request: &str,
    ) -> Result<QueryReport, PipelineError> {
        let compiled = self.compile(kind, target, request).await?;
        self.execute(compiled).await
    }

    /// Run caller-supplied query text, skipping introspection and generation.
    pub async fn run_payload(
        &self,
        kind: StoreKind,
        target: &str,
        text: &str,
    ) -> Result<QueryReport, PipelineError> {
        let compiled = compile_text(kind, target, text)?;
        self.execute(compiled).await
    }

    /// Route and execute a compiled query against its target.
    pub async fn execute(&self, compiled: CompiledQuery) -> Result<QueryReport, PipelineError> {
        let outcome = execute_query(self.config, compiled.store, &compiled.target, &compiled.query).await?;
        if !outcome.is_success() {
            tracing::warn!(
                database = %compiled.target,
                failures = outcome.errors().len(),
                "query finished with errors"
            );
        }
        Ok(QueryReport { compiled, outcome })
    }
}

/// Sanitize and parse `text` for a store kind.
pub fn compile_text(kind: StoreKind, target: &str, text: &str) -> Result<CompiledQuery, PipelineError> {
    let payload = sanitize(text)?;
    let query = parse_query(payload.as_str(), kind)?;
    tracing::debug!(shape = %query.shape(), container = ?query.container(), "parsed query");

    Ok(CompiledQuery {
        store: kind,
        target: target.to_string(),
        schema: None,
        prompt: None,
        raw_text: None,
        display: query.to_string().trim_end().to_string(),
        literal: render_query(&query),
        payload,
        query,
    })
}

/// Open the target, run the routed strategy, close the target.
pub async fn execute_query(
    config: &Config,
    kind: StoreKind,
    target: &str,
    query: &StructuredQuery,
) -> Result<QueryOutcome, PipelineError> {
    let pool = db::connect(config, kind, target)
        .await
        .map_err(|e| PipelineError::schema_unavailable(target, format!("{:#}", e)))?;

    let outcome = db::scoped(pool, |pool| async move {
        match route(query) {
            ExecutionStrategy::Relational { statements } => {
                tracing::debug!(count = statements.len(), "executing statements");
                let reports = RelationalExecutor::new(pool).execute(statements).await;
                materialize_statements(reports)
            }
            strategy => {
                let store = SqliteDocumentStore::new(pool);
                let result = DocumentExecutor::new(&store).execute(strategy).await;
                materialize_document(result, &query.to_string())
            }
        }
    })
    .await;

    Ok(outcome)
}
