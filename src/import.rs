//! Loading JSON files into a document database.
//!
//! Each file becomes one collection named after the file stem. A file may
//! hold a JSON array of objects, a single JSON object, or newline-delimited
//! JSON objects. Importing a collection that already exists replaces it.
//! Lines or entries that are not JSON objects are skipped and reported.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

use chatdb_core::store::DocumentStore;
use chatdb_core::{Document, StoreKind};

use crate::config::Config;
use crate::db;
use crate::document_store::SqliteDocumentStore;
use crate::migrate;

/// Result of importing one file.
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub file: String,
    pub collection: String,
    pub inserted: usize,
    /// Whether an existing collection of the same name was dropped first.
    pub replaced: bool,
    pub warnings: Vec<String>,
}

/// Documents parsed from one file, plus a warning per skipped entry.
#[derive(Debug, Default)]
pub struct ParsedFile {
    pub documents: Vec<Document>,
    pub warnings: Vec<String>,
}

fn push_object(parsed: &mut ParsedFile, value: Value, location: &str) {
    match value {
        Value::Object(doc) => parsed.documents.push(doc),
        other => parsed.warnings.push(format!(
            "{}: expected a JSON object, found {}",
            location,
            json_type(&other)
        )),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Parse file contents in any of the accepted layouts.
pub fn parse_documents(content: &str) -> ParsedFile {
    let mut parsed = ParsedFile::default();
    let trimmed = content.trim_start();

    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        if let Ok(value) = serde_json::from_str::<Value>(content) {
            match value {
                Value::Array(items) => {
                    for (i, item) in items.into_iter().enumerate() {
                        push_object(&mut parsed, item, &format!("entry {}", i + 1));
                    }
                }
                other => push_object(&mut parsed, other, "document"),
            }
            return parsed;
        }
    }

    // Newline-delimited JSON
    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) => push_object(&mut parsed, value, &format!("line {}", i + 1)),
            Err(e) => parsed.warnings.push(format!("line {}: {}", i + 1, e)),
        }
    }
    parsed
}

fn collection_name(path: &Path) -> Result<String> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::trim)
        .unwrap_or_default();
    if stem.is_empty() {
        bail!("cannot derive a collection name from {}", path.display());
    }
    Ok(stem.to_string())
}

async fn import_file(store: &dyn DocumentStore, path: &Path) -> Result<ImportSummary> {
    let collection = collection_name(path)?;
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let parsed = parse_documents(&content);

    for warning in &parsed.warnings {
        tracing::warn!(file = %path.display(), "skipped {}", warning);
    }

    let mut summary = ImportSummary {
        file: path.display().to_string(),
        collection,
        inserted: 0,
        replaced: false,
        warnings: parsed.warnings,
    };

    if parsed.documents.is_empty() {
        summary
            .warnings
            .push("no documents found; collection left unchanged".to_string());
        return Ok(summary);
    }

    summary.replaced = store.drop_collection(&summary.collection).await?;
    summary.inserted = store
        .insert_many(&summary.collection, parsed.documents)
        .await?;
    Ok(summary)
}

/// Import `files` into document database `name`, creating it if needed.
pub async fn import_files(config: &Config, name: &str, files: &[impl AsRef<Path>]) -> Result<Vec<ImportSummary>> {
    let pool = db::connect_or_create(config, StoreKind::Document, name).await?;
    db::scoped(pool, |pool| async move {
        migrate::ensure_document_schema(&pool).await?;
        let store = SqliteDocumentStore::new(pool);

        let mut summaries = Vec::with_capacity(files.len());
        for file in files {
            let summary = import_file(&store, file.as_ref()).await?;
            tracing::info!(
                collection = %summary.collection,
                inserted = summary.inserted,
                "imported"
            );
            summaries.push(summary);
        }
        Ok::<_, anyhow::Error>(summaries)
    })
    .await
}
