//! Storage abstraction for document collections.
//!
//! The [`DocumentStore`] trait is what [`DocumentExecutor`](crate::executor::DocumentExecutor)
//! and schema introspection need from a collection-based backend. The
//! query semantics (filters, pipelines, update operators) live in
//! [`crate::engine`]; backends only load and persist documents and may
//! reuse the helpers in this module.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::engine::{aggregate, filter, update};
use crate::models::Document;

/// Outcome of an `update_many`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpdateSummary {
    /// Documents that satisfied the filter.
    pub matched: u64,
    /// Documents whose contents actually changed.
    pub modified: u64,
}

/// Abstract collection store.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`list_collections`](DocumentStore::list_collections) | Collection names in creation order |
/// | [`sample_document`](DocumentStore::sample_document) | First document of a collection |
/// | [`find`](DocumentStore::find) | Documents matching a filter |
/// | [`aggregate`](DocumentStore::aggregate) | Run a stage pipeline |
/// | [`update_many`](DocumentStore::update_many) | Apply update operators to every match |
/// | [`insert_many`](DocumentStore::insert_many) | Append documents, assigning `_id` |
/// | [`drop_collection`](DocumentStore::drop_collection) | Remove a collection and its documents |
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// The first stored document, or `None` for an empty or unknown collection.
    async fn sample_document(&self, collection: &str) -> Result<Option<Document>>;

    /// Matching documents in storage order. Unknown collections yield nothing.
    async fn find(&self, collection: &str, filter: &Document) -> Result<Vec<Document>>;

    async fn aggregate(&self, collection: &str, stages: &[Document]) -> Result<Vec<Document>>;

    /// All-or-nothing: if the update fails for any document, nothing is written.
    async fn update_many(
        &self,
        collection: &str,
        filter: &Document,
        update: &Document,
    ) -> Result<UpdateSummary>;

    /// Append documents, creating the collection if needed. Returns the
    /// number inserted.
    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<usize>;

    /// Returns whether the collection existed.
    async fn drop_collection(&self, collection: &str) -> Result<bool>;
}

/// Give a document an `_id` if it has none. The id is placed first.
pub fn with_object_id(doc: Document) -> Document {
    if doc.contains_key("_id") {
        return doc;
    }
    let mut out = Document::with_capacity(doc.len() + 1);
    out.insert(
        "_id".to_string(),
        Value::String(uuid::Uuid::new_v4().simple().to_string()),
    );
    out.extend(doc);
    out
}

/// Filter already-loaded documents.
pub fn filter_documents(docs: Vec<Document>, filter: &Document) -> Result<Vec<Document>> {
    let mut out = Vec::new();
    for doc in docs {
        if filter::matches(&doc, filter)? {
            out.push(doc);
        }
    }
    Ok(out)
}

/// Run a pipeline over already-loaded documents.
pub fn aggregate_documents(docs: Vec<Document>, stages: &[Document]) -> Result<Vec<Document>> {
    aggregate::run_pipeline(docs, stages)
}

/// Apply an update to every matching document in `docs`.
///
/// Returns the summary and the indexes of documents that changed. `docs`
/// is only modified when every matching document updated cleanly.
pub fn update_documents(
    docs: &mut [Document],
    filter: &Document,
    update_doc: &Document,
) -> Result<(UpdateSummary, Vec<usize>)> {
    update::validate_update(update_doc)?;

    let mut summary = UpdateSummary::default();
    let mut staged = Vec::new();
    for (idx, doc) in docs.iter().enumerate() {
        if !filter::matches(doc, filter)? {
            continue;
        }
        summary.matched += 1;
        let mut copy = doc.clone();
        if update::apply_update(&mut copy, update_doc)? {
            staged.push((idx, copy));
        }
    }

    summary.modified = staged.len() as u64;
    let changed = staged.iter().map(|(idx, _)| *idx).collect();
    for (idx, doc) in staged {
        docs[idx] = doc;
    }
    Ok((summary, changed))
}
