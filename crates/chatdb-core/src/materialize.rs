//! Normalizing executor output into a [`QueryOutcome`].

use indexmap::IndexSet;
use serde_json::Value;

use crate::error::PipelineError;
use crate::models::{
    Document, ExecutionResult, MutationSummary, QueryOutcome, StatementError, StatementReport,
    Table,
};

/// Tabulate documents. Columns are the union of keys in first-seen order;
/// a document without a column gets `null` there.
pub fn documents_to_table(docs: Vec<Document>) -> Table {
    let mut columns: IndexSet<String> = IndexSet::new();
    for doc in &docs {
        for key in doc.keys() {
            if !columns.contains(key) {
                columns.insert(key.clone());
            }
        }
    }

    let rows = docs
        .into_iter()
        .map(|mut doc| {
            columns
                .iter()
                .map(|c| doc.remove(c).unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    Table {
        columns: columns.into_iter().collect(),
        rows,
    }
}

/// Relational results keep one report per statement, in order.
pub fn materialize_statements(reports: Vec<StatementReport>) -> QueryOutcome {
    QueryOutcome::Statements { reports }
}

/// A document operation either produced a result or failed as a whole.
pub fn materialize_document(
    result: Result<ExecutionResult, PipelineError>,
    attempted: &str,
) -> QueryOutcome {
    match result {
        Ok(ExecutionResult::Table(table)) => QueryOutcome::Table(table),
        Ok(ExecutionResult::Mutation(summary)) => QueryOutcome::Mutation(summary),
        Ok(ExecutionResult::Error(err)) => QueryOutcome::Failed(err),
        Err(PipelineError::ExecutionError { statement, message }) => {
            QueryOutcome::Failed(StatementError {
                position: 0,
                statement,
                message,
            })
        }
        Err(other) => QueryOutcome::Failed(StatementError {
            position: 0,
            statement: attempted.to_string(),
            message: other.to_string(),
        }),
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Plain-text grid for terminals.
pub fn render_table(table: &Table) -> String {
    if table.columns.is_empty() {
        return format!("({} rows)\n", table.rows.len());
    }

    let cells: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| row.iter().map(cell_text).collect())
        .collect();

    let mut widths: Vec<usize> = table.columns.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let line = |values: &[String]| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:<width$}", v, width = *w))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&line(&table.columns));
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    out.push('\n');
    for row in &cells {
        out.push_str(&line(row));
        out.push('\n');
    }
    out.push_str(&format!(
        "({} row{})\n",
        table.rows.len(),
        if table.rows.len() == 1 { "" } else { "s" }
    ));
    out
}

/// One-line description of a mutation.
pub fn describe_mutation(summary: &MutationSummary, noun: &str) -> String {
    match summary.affected {
        Some(n) => format!("{} {}(s) affected.", n, noun),
        None => "OK.".to_string(),
    }
}
