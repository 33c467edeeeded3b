//! In-memory [`DocumentStore`] for tests.
//!
//! Collections are `Vec`s in an `IndexMap` behind `std::sync::RwLock`, so
//! collection order is creation order.

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use indexmap::IndexMap;

use crate::models::Document;

use super::{
    aggregate_documents, filter_documents, update_documents, with_object_id, DocumentStore,
    UpdateSummary,
};

pub struct InMemoryDocumentStore {
    collections: RwLock<IndexMap<String, Vec<Document>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(IndexMap::new()),
        }
    }

    fn snapshot(&self, collection: &str) -> Result<Vec<Document>> {
        let collections = self
            .collections
            .read()
            .map_err(|_| anyhow!("document store lock poisoned"))?;
        Ok(collections.get(collection).cloned().unwrap_or_default())
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn list_collections(&self) -> Result<Vec<String>> {
        let collections = self
            .collections
            .read()
            .map_err(|_| anyhow!("document store lock poisoned"))?;
        Ok(collections.keys().cloned().collect())
    }

    async fn sample_document(&self, collection: &str) -> Result<Option<Document>> {
        Ok(self.snapshot(collection)?.into_iter().next())
    }

    async fn find(&self, collection: &str, filter: &Document) -> Result<Vec<Document>> {
        filter_documents(self.snapshot(collection)?, filter)
    }

    async fn aggregate(&self, collection: &str, stages: &[Document]) -> Result<Vec<Document>> {
        aggregate_documents(self.snapshot(collection)?, stages)
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Document,
        update: &Document,
    ) -> Result<UpdateSummary> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| anyhow!("document store lock poisoned"))?;
        match collections.get_mut(collection) {
            Some(docs) => Ok(update_documents(docs, filter, update)?.0),
            None => {
                crate::engine::update::validate_update(update)?;
                Ok(UpdateSummary::default())
            }
        }
    }

    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<usize> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| anyhow!("document store lock poisoned"))?;
        let count = docs.len();
        collections
            .entry(collection.to_string())
            .or_default()
            .extend(docs.into_iter().map(with_object_id));
        Ok(count)
    }

    async fn drop_collection(&self, collection: &str) -> Result<bool> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| anyhow!("document store lock poisoned"))?;
        Ok(collections.shift_remove(collection).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_insert_find_drop() {
        let store = InMemoryDocumentStore::new();
        store
            .insert_many(
                "doctors",
                vec![doc(json!({"name": "Ann"})), doc(json!({"name": "Bob"}))],
            )
            .await
            .unwrap();
        store.insert_many("nurses", vec![]).await.unwrap();

        assert_eq!(store.list_collections().await.unwrap(), vec!["doctors", "nurses"]);
        let found = store
            .find("doctors", &doc(json!({"name": "Bob"})))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].contains_key("_id"));

        assert!(store.sample_document("nurses").await.unwrap().is_none());
        assert!(store.find("missing", &Document::new()).await.unwrap().is_empty());

        assert!(store.drop_collection("doctors").await.unwrap());
        assert!(!store.drop_collection("doctors").await.unwrap());
        assert_eq!(store.list_collections().await.unwrap(), vec!["nurses"]);
    }

    #[tokio::test]
    async fn test_update_many_persists() {
        let store = InMemoryDocumentStore::new();
        store
            .insert_many("c", vec![doc(json!({"n": 1})), doc(json!({"n": 2}))])
            .await
            .unwrap();
        let summary = store
            .update_many("c", &Document::new(), &doc(json!({"$inc": {"n": 10}})))
            .await
            .unwrap();
        assert_eq!(summary.modified, 2);
        let all = store.find("c", &Document::new()).await.unwrap();
        assert_eq!(all[1]["n"], json!(12));
    }
}
