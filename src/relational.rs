//! Relational execution.
//!
//! [`RelationalExecutor`] runs statements one at a time, in order, each in
//! its own implicit transaction. A failing statement is recorded against
//! its position and execution moves on to the next one; earlier statements
//! stay committed. There is no surrounding transaction.
//!
//! Statements that describe result columns are fetched into a [`Table`];
//! others are executed and reported as a [`MutationSummary`] whose count is
//! set for `INSERT`, `UPDATE`, `DELETE` and `REPLACE` and left empty for
//! everything else (DDL, pragmas).

use anyhow::Result;
use base64::Engine as _;
use serde_json::Value;
use sqlx::sqlite::{SqliteRow, SqliteValueRef};
use sqlx::{Column, Executor, Row, SqlitePool, Statement, TypeInfo, ValueRef};

use chatdb_core::{ExecutionResult, MutationSummary, StatementError, StatementReport, Table};

const COUNTED_VERBS: &[&str] = &["INSERT", "UPDATE", "DELETE", "REPLACE"];

pub struct RelationalExecutor {
    pool: SqlitePool,
}

impl RelationalExecutor {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Run every statement; one report per statement, in input order.
    pub async fn execute(&self, statements: &[String]) -> Vec<StatementReport> {
        let mut reports = Vec::with_capacity(statements.len());
        for (position, statement) in statements.iter().enumerate() {
            let result = match self.execute_one(statement).await {
                Ok(result) => result,
                Err(e) => {
                    let message = format!("{:#}", e);
                    tracing::warn!(position = position + 1, error = %message, "statement failed");
                    ExecutionResult::Error(StatementError {
                        position,
                        statement: statement.clone(),
                        message,
                    })
                }
            };
            reports.push(StatementReport {
                position,
                statement: statement.clone(),
                result,
            });
        }
        reports
    }

    async fn execute_one(&self, statement: &str) -> Result<ExecutionResult> {
        let prepared = (&self.pool).prepare(statement).await?;
        let columns: Vec<String> = prepared
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        if columns.is_empty() {
            let done = sqlx::query(statement).execute(&self.pool).await?;
            let affected = counts_rows(statement).then(|| done.rows_affected());
            return Ok(ExecutionResult::Mutation(MutationSummary { affected }));
        }

        let rows = sqlx::query(statement).fetch_all(&self.pool).await?;
        let rows = rows
            .iter()
            .map(|row| row_values(row, columns.len()))
            .collect::<Result<Vec<_>>>()?;
        Ok(ExecutionResult::Table(Table { columns, rows }))
    }

    pub fn into_pool(self) -> SqlitePool {
        self.pool
    }
}

fn counts_rows(statement: &str) -> bool {
    let verb = statement
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    COUNTED_VERBS.contains(&verb.as_str())
}

fn row_values(row: &SqliteRow, width: usize) -> Result<Vec<Value>> {
    (0..width).map(|i| cell_value(row, i)).collect()
}

/// Convert by the value's storage class, not the declared column type.
fn cell_value(row: &SqliteRow, index: usize) -> Result<Value> {
    let raw: SqliteValueRef<'_> = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let storage = raw.type_info().name().to_string();
    let value = match storage.as_str() {
        "INTEGER" => Value::from(row.try_get::<i64, _>(index)?),
        "REAL" => Value::from(row.try_get::<f64, _>(index)?),
        "BLOB" => Value::String(
            base64::engine::general_purpose::STANDARD.encode(row.try_get::<Vec<u8>, _>(index)?),
        ),
        _ => Value::String(row.try_get::<String, _>(index)?),
    };
    Ok(value)
}
