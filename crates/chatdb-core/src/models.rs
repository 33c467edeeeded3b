//! Core data types shared by every stage of a query request.
//!
//! All of these values are created and dropped within one request. Nothing
//! here is cached or shared between requests.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON-compatible mapping from string keys to values, recursively.
///
/// Key order is preserved (`serde_json` is built with `preserve_order`), so
/// documents keep the order in which their fields were written.
pub type Document = serde_json::Map<String, Value>;

/// Which backend a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Tabular, schema-on-write store queried with SQL.
    Relational,
    /// Collection-based, schema-on-read store queried with filter/pipeline literals.
    Document,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Relational => "relational",
            StoreKind::Document => "document",
        }
    }

    /// The word used for a container of this store kind.
    pub fn container_noun(&self) -> &'static str {
        match self {
            StoreKind::Relational => "table",
            StoreKind::Document => "collection",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sql" | "relational" | "sqlite" | "mysql" => Ok(StoreKind::Relational),
            "document" | "doc" | "docs" | "mongo" | "mongodb" => Ok(StoreKind::Document),
            other => Err(format!(
                "unknown store kind '{}': use 'sql' or 'document'",
                other
            )),
        }
    }
}

/// Container name → ordered field names, as introspected for one request.
///
/// Containers keep the order in which the introspector reported them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SchemaSummary {
    containers: IndexMap<String, Vec<String>>,
}

impl SchemaSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, container: impl Into<String>, fields: Vec<String>) {
        self.containers.insert(container.into(), fields);
    }

    pub fn fields(&self, container: &str) -> Option<&[String]> {
        self.containers.get(container).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.containers
            .iter()
            .map(|(name, fields)| (name.as_str(), fields.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Vec<String>)> for SchemaSummary {
    fn from_iter<I: IntoIterator<Item = (S, Vec<String>)>>(iter: I) -> Self {
        let mut summary = SchemaSummary::new();
        for (name, fields) in iter {
            summary.insert(name, fields);
        }
        summary
    }
}

/// The text sent to the generation provider. Immutable once assembled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct GenerationPrompt(String);

impl GenerationPrompt {
    pub(crate) fn new(text: String) -> Self {
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GenerationPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generated text with prose and fence lines removed. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SanitizedPayload(String);

impl SanitizedPayload {
    pub(crate) fn new(text: String) -> Self {
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SanitizedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated, typed query. Exactly one variant per request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum StructuredQuery {
    /// SQL statements in execution order. Never contains an empty statement.
    RelationalStatements { statements: Vec<String> },
    /// Read documents matching a filter.
    DocumentFilter { container: String, filter: Document },
    /// Run an aggregation pipeline.
    DocumentPipeline {
        container: String,
        stages: Vec<Document>,
    },
    /// Update every document matching `filter`.
    DocumentUpdate {
        container: String,
        filter: Document,
        update: Document,
    },
}

/// The variant tag of a [`StructuredQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryShape {
    Statements,
    Filter,
    Pipeline,
    Update,
}

impl fmt::Display for QueryShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryShape::Statements => "statements",
            QueryShape::Filter => "filter",
            QueryShape::Pipeline => "pipeline",
            QueryShape::Update => "update",
        };
        f.write_str(name)
    }
}

impl StructuredQuery {
    pub fn shape(&self) -> QueryShape {
        match self {
            StructuredQuery::RelationalStatements { .. } => QueryShape::Statements,
            StructuredQuery::DocumentFilter { .. } => QueryShape::Filter,
            StructuredQuery::DocumentPipeline { .. } => QueryShape::Pipeline,
            StructuredQuery::DocumentUpdate { .. } => QueryShape::Update,
        }
    }

    pub fn store_kind(&self) -> StoreKind {
        match self {
            StructuredQuery::RelationalStatements { .. } => StoreKind::Relational,
            _ => StoreKind::Document,
        }
    }

    /// Collection name for document variants.
    pub fn container(&self) -> Option<&str> {
        match self {
            StructuredQuery::RelationalStatements { .. } => None,
            StructuredQuery::DocumentFilter { container, .. }
            | StructuredQuery::DocumentPipeline { container, .. }
            | StructuredQuery::DocumentUpdate { container, .. } => Some(container),
        }
    }
}

fn pretty(value: &impl Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "<unprintable>".to_string())
}

/// Renders the query in the form it is executed, for display before running.
impl fmt::Display for StructuredQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructuredQuery::RelationalStatements { statements } => {
                for statement in statements {
                    writeln!(f, "{};", statement)?;
                }
                Ok(())
            }
            StructuredQuery::DocumentFilter { container, filter } => {
                write!(f, "db['{}'].find({})", container, pretty(filter))
            }
            StructuredQuery::DocumentPipeline { container, stages } => {
                write!(f, "db['{}'].aggregate({})", container, pretty(stages))
            }
            StructuredQuery::DocumentUpdate {
                container,
                filter,
                update,
            } => write!(
                f,
                "db['{}'].update_many({}, {})",
                container,
                pretty(filter),
                pretty(update)
            ),
        }
    }
}

/// Named columns plus positional rows aligned to them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Value at `row` for the named column.
    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }
}

/// Outcome of a statement or operation that returns no rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MutationSummary {
    /// Records affected, when the backend reports it. `None` marks a
    /// successful statement with nothing to count (DDL, pragmas).
    pub affected: Option<u64>,
}

/// A failed statement or operation, with the backend's diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementError {
    /// Zero-based position of the statement within the request.
    pub position: usize,
    pub statement: String,
    pub message: String,
}

impl fmt::Display for StatementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "statement {} failed: {}\n  {}",
            self.position + 1,
            self.message,
            self.statement
        )
    }
}

/// Result of executing one statement or operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionResult {
    Table(Table),
    Mutation(MutationSummary),
    Error(StatementError),
}

impl ExecutionResult {
    pub fn is_error(&self) -> bool {
        matches!(self, ExecutionResult::Error(_))
    }
}

/// One relational statement together with what happened to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementReport {
    pub position: usize,
    pub statement: String,
    pub result: ExecutionResult,
}

/// The normalized, presentation-ready outcome of a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryOutcome {
    /// Rows from a document read or aggregation.
    Table(Table),
    /// Modified-record count from a document update.
    Mutation(MutationSummary),
    /// Per-statement results of a relational request, in order.
    Statements { reports: Vec<StatementReport> },
    /// A document operation that failed as a whole.
    Failed(StatementError),
}

impl QueryOutcome {
    /// Every error record in the outcome, in statement order.
    pub fn errors(&self) -> Vec<&StatementError> {
        match self {
            QueryOutcome::Failed(err) => vec![err],
            QueryOutcome::Statements { reports } => reports
                .iter()
                .filter_map(|r| match &r.result {
                    ExecutionResult::Error(err) => Some(err),
                    _ => None,
                })
                .collect(),
            QueryOutcome::Table(_) | QueryOutcome::Mutation(_) => Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors().is_empty()
    }
}
