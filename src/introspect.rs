//! Schema introspection.
//!
//! [`SchemaIntrospector`] reads live metadata from a target database and
//! returns a [`SchemaSummary`]:
//!
//! | Store | Containers | Fields |
//! |-------|------------|--------|
//! | relational | user tables from `sqlite_master`, by name | `pragma_table_info`, declared order |
//! | document | collections, creation order | keys of the first document |
//!
//! Document fields come from a single sampled document, so they can be
//! incomplete for heterogeneous collections. Empty collections are left
//! out of the summary. Only read-only queries are issued, and a database
//! that does not exist is reported as [`PipelineError::SchemaUnavailable`]
//! rather than created.

use anyhow::Result;
use sqlx::SqlitePool;

use chatdb_core::store::DocumentStore;
use chatdb_core::{PipelineError, SchemaSummary, StoreKind};

use crate::config::Config;
use crate::db;
use crate::document_store::SqliteDocumentStore;

pub struct SchemaIntrospector<'c> {
    config: &'c Config,
}

impl<'c> SchemaIntrospector<'c> {
    pub fn new(config: &'c Config) -> Self {
        Self { config }
    }

    pub async fn introspect(
        &self,
        kind: StoreKind,
        target: &str,
    ) -> Result<SchemaSummary, PipelineError> {
        let pool = db::connect(self.config, kind, target)
            .await
            .map_err(|e| PipelineError::schema_unavailable(target, format!("{:#}", e)))?;

        let summary = db::scoped(pool, |pool| async move {
            match kind {
                StoreKind::Relational => relational_schema(&pool).await,
                StoreKind::Document => document_schema(&SqliteDocumentStore::new(pool)).await,
            }
        })
        .await
        .map_err(|e| PipelineError::schema_unavailable(target, format!("{:#}", e)))?;

        tracing::debug!(
            store = %kind,
            database = target,
            containers = summary.len(),
            "introspected schema"
        );
        Ok(summary)
    }
}

pub async fn relational_schema(pool: &SqlitePool) -> Result<SchemaSummary> {
    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    let mut summary = SchemaSummary::new();
    for table in tables {
        let columns: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_table_info(?) ORDER BY cid")
                .bind(&table)
                .fetch_all(pool)
                .await?;
        summary.insert(table, columns);
    }
    Ok(summary)
}

pub async fn document_schema(store: &dyn DocumentStore) -> Result<SchemaSummary> {
    let mut summary = SchemaSummary::new();
    for collection in store.list_collections().await? {
        if let Some(sample) = store.sample_document(&collection).await? {
            let fields = sample.keys().cloned().collect();
            summary.insert(collection, fields);
        }
    }
    Ok(summary)
}
