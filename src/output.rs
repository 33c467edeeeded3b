//! Terminal rendering of schemas, queries and outcomes.
//!
//! Every function returns a `String`; the binary decides where it goes.
//! JSON output is the `serde` form of the same values.

use anyhow::Result;
use serde::Serialize;

use chatdb_core::materialize::{describe_mutation, render_table};
use chatdb_core::prompt::render_schema;
use chatdb_core::{ExecutionResult, QueryOutcome, SchemaSummary, StoreKind};

use crate::import::ImportSummary;
use crate::pipeline::{CompiledQuery, QueryReport};

pub fn to_json(value: &impl Serialize) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn schema_text(kind: StoreKind, target: &str, schema: &SchemaSummary) -> String {
    format!(
        "{} database '{}' ({} {}{}):\n{}",
        kind,
        target,
        schema.len(),
        kind.container_noun(),
        if schema.len() == 1 { "" } else { "s" },
        render_schema(schema)
    )
}

pub fn compiled_text(compiled: &CompiledQuery) -> String {
    format!("Query:\n{}\n", compiled.display)
}

fn result_text(result: &ExecutionResult) -> String {
    match result {
        ExecutionResult::Table(table) => render_table(table),
        ExecutionResult::Mutation(summary) => {
            format!("{}\n", describe_mutation(summary, "row"))
        }
        ExecutionResult::Error(err) => format!("error: {}\n", err.message),
    }
}

pub fn outcome_text(outcome: &QueryOutcome) -> String {
    match outcome {
        QueryOutcome::Table(table) => render_table(table),
        QueryOutcome::Mutation(summary) => {
            format!("{} document(s) updated.\n", summary.affected.unwrap_or(0))
        }
        QueryOutcome::Failed(err) => format!("error: {}\n", err.message),
        QueryOutcome::Statements { reports } => {
            let mut out = String::new();
            for (i, report) in reports.iter().enumerate() {
                if reports.len() > 1 {
                    if i > 0 {
                        out.push('\n');
                    }
                    out.push_str(&format!("[{}] {}\n", report.position + 1, report.statement));
                }
                out.push_str(&result_text(&report.result));
            }
            out
        }
    }
}

pub fn report_text(report: &QueryReport) -> String {
    format!("{}\n{}", compiled_text(&report.compiled), outcome_text(&report.outcome))
}

pub fn import_text(summaries: &[ImportSummary]) -> String {
    let mut out = String::new();
    for s in summaries {
        out.push_str(&format!(
            "{} -> {}: {} document(s){}\n",
            s.file,
            s.collection,
            s.inserted,
            if s.replaced { " (replaced)" } else { "" }
        ));
        for warning in &s.warnings {
            out.push_str(&format!("  warning: {}\n", warning));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatdb_core::{MutationSummary, StatementError, StatementReport, Table};
    use serde_json::json;

    #[test]
    fn test_document_update_wording() {
        let outcome = QueryOutcome::Mutation(MutationSummary { affected: Some(1) });
        assert_eq!(outcome_text(&outcome), "1 document(s) updated.\n");
    }

    #[test]
    fn test_statement_reports() {
        let outcome = QueryOutcome::Statements {
            reports: vec![
                StatementReport {
                    position: 0,
                    statement: "DROP TABLE missing".to_string(),
                    result: ExecutionResult::Error(StatementError {
                        position: 0,
                        statement: "DROP TABLE missing".to_string(),
                        message: "no such table: missing".to_string(),
                    }),
                },
                StatementReport {
                    position: 1,
                    statement: "SELECT 1".to_string(),
                    result: ExecutionResult::Table(Table {
                        columns: vec!["1".to_string()],
                        rows: vec![vec![json!(1)]],
                    }),
                },
            ],
        };
        let text = outcome_text(&outcome);
        assert!(text.starts_with("[1] DROP TABLE missing\nerror: no such table: missing\n"));
        assert!(text.contains("[2] SELECT 1\n1\n-\n1\n(1 row)\n"));
    }

    #[test]
    fn test_schema_text() {
        let schema: SchemaSummary = vec![("orders", vec!["id".to_string(), "total".to_string()])]
            .into_iter()
            .collect();
        assert_eq!(
            schema_text(StoreKind::Relational, "shop", &schema),
            "relational database 'shop' (1 table):\n- orders with fields: [id, total]\n"
        );
    }
}
