//! SQLite-backed [`DocumentStore`].
//!
//! A document database is a SQLite file with two tables (see
//! [`migrate::ensure_document_schema`](crate::migrate::ensure_document_schema)):
//! `collections` lists collection names in creation order and `records`
//! holds one JSON document per row in insertion order. Filtering,
//! aggregation and updates are evaluated by the `chatdb-core` engine over
//! the loaded documents. `update_many` takes the database write lock
//! (`BEGIN IMMEDIATE`) before reading, so concurrent updates from other
//! connections or processes are serialized rather than lost.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteConnection;
use sqlx::{Row, SqlitePool};

use chatdb_core::store::{
    aggregate_documents, filter_documents, update_documents, with_object_id, DocumentStore,
    UpdateSummary,
};
use chatdb_core::Document;

pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load(&self, collection: &str) -> Result<Vec<(i64, Document)>> {
        let mut conn = self.pool.acquire().await?;
        fetch_records(&mut conn, collection).await
    }

    async fn documents(&self, collection: &str) -> Result<Vec<Document>> {
        Ok(self.load(collection).await?.into_iter().map(|(_, d)| d).collect())
    }
}

async fn fetch_records(conn: &mut SqliteConnection, collection: &str) -> Result<Vec<(i64, Document)>> {
    let rows = sqlx::query("SELECT id, body FROM records WHERE collection = ? ORDER BY id")
        .bind(collection)
        .fetch_all(&mut *conn)
        .await?;

    rows.iter()
        .map(|row| {
            let id: i64 = row.get("id");
            let body: String = row.get("body");
            let doc: Document = serde_json::from_str(&body)
                .with_context(|| format!("corrupt record {} in collection '{}'", id, collection))?;
            Ok((id, doc))
        })
        .collect()
}

/// Read, update and write back on a connection that already holds the
/// write lock.
async fn update_locked(
    conn: &mut SqliteConnection,
    collection: &str,
    filter: &Document,
    update: &Document,
) -> Result<UpdateSummary> {
    let (ids, mut docs): (Vec<i64>, Vec<Document>) =
        fetch_records(&mut *conn, collection).await?.into_iter().unzip();
    let (summary, changed) = update_documents(&mut docs, filter, update)?;

    for idx in changed {
        sqlx::query("UPDATE records SET body = ? WHERE id = ?")
            .bind(serde_json::to_string(&docs[idx])?)
            .bind(ids[idx])
            .execute(&mut *conn)
            .await?;
    }
    Ok(summary)
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn list_collections(&self) -> Result<Vec<String>> {
        let names = sqlx::query_scalar("SELECT name FROM collections ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    async fn sample_document(&self, collection: &str) -> Result<Option<Document>> {
        let body: Option<String> = sqlx::query_scalar(
            "SELECT body FROM records WHERE collection = ? ORDER BY id LIMIT 1",
        )
        .bind(collection)
        .fetch_optional(&self.pool)
        .await?;

        match body {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    async fn find(&self, collection: &str, filter: &Document) -> Result<Vec<Document>> {
        filter_documents(self.documents(collection).await?, filter)
    }

    async fn aggregate(&self, collection: &str, stages: &[Document]) -> Result<Vec<Document>> {
        aggregate_documents(self.documents(collection).await?, stages)
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Document,
        update: &Document,
    ) -> Result<UpdateSummary> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let result = match update_locked(&mut conn, collection, filter, update).await {
            Ok(summary) => sqlx::query("COMMIT")
                .execute(&mut *conn)
                .await
                .map(|_| summary)
                .map_err(anyhow::Error::from),
            Err(e) => Err(e),
        };
        if result.is_err() {
            // Nothing was committed; leave the connection outside a transaction.
            let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
        }
        let summary = result?;

        tracing::debug!(
            collection,
            matched = summary.matched,
            modified = summary.modified,
            "update_many"
        );
        Ok(summary)
    }

    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO collections (name, created_at) VALUES (?, strftime('%s', 'now'))
             ON CONFLICT(name) DO NOTHING",
        )
        .bind(collection)
        .execute(&mut *tx)
        .await?;

        let count = docs.len();
        for doc in docs {
            let body = serde_json::to_string(&with_object_id(doc))?;
            sqlx::query("INSERT INTO records (collection, body) VALUES (?, ?)")
                .bind(collection)
                .bind(body)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(count)
    }

    async fn drop_collection(&self, collection: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM records WHERE collection = ?")
            .bind(collection)
            .execute(&mut *tx)
            .await?;
        let removed = sqlx::query("DELETE FROM collections WHERE name = ?")
            .bind(collection)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::{db, migrate};
    use chatdb_core::StoreKind;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    async fn store(tmp: &TempDir) -> SqliteDocumentStore {
        let config = Config::minimal(tmp.path());
        migrate::init_database(&config, StoreKind::Document, "clinic")
            .await
            .unwrap();
        SqliteDocumentStore::new(db::connect(&config, StoreKind::Document, "clinic").await.unwrap())
    }

    #[tokio::test]
    async fn test_round_trip_preserves_field_order() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;
        store
            .insert_many("doctors", vec![doc(json!({"zeta": 1, "alpha": 2}))])
            .await
            .unwrap();

        let sample = store.sample_document("doctors").await.unwrap().unwrap();
        let keys: Vec<&str> = sample.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["_id", "zeta", "alpha"]);
        assert_eq!(store.list_collections().await.unwrap(), vec!["doctors"]);
    }

    #[tokio::test]
    async fn test_update_many_writes_back() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;
        store
            .insert_many(
                "doctors",
                vec![
                    doc(json!({"name": "John Smith", "years": 25})),
                    doc(json!({"name": "Ana Ruiz", "years": 8})),
                ],
            )
            .await
            .unwrap();

        let summary = store
            .update_many(
                "doctors",
                &doc(json!({"name": {"$regex": "Smith$"}})),
                &doc(json!({"$set": {"years": 30}})),
            )
            .await
            .unwrap();
        assert_eq!(summary, UpdateSummary { matched: 1, modified: 1 });

        let found = store
            .find("doctors", &doc(json!({"years": 30})))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["name"], json!("John Smith"));
    }

    async fn bump(store: &SqliteDocumentStore, filter: &Document, inc: &Document) {
        for _ in 0..10 {
            let summary = store.update_many("counters", filter, inc).await.unwrap();
            assert_eq!(summary, UpdateSummary { matched: 1, modified: 1 });
        }
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_serialized() {
        let tmp = TempDir::new().unwrap();
        let config = Config::minimal(tmp.path());
        migrate::init_database(&config, StoreKind::Document, "clinic")
            .await
            .unwrap();
        let open = || async {
            SqliteDocumentStore::new(db::connect(&config, StoreKind::Document, "clinic").await.unwrap())
        };
        let (first, second) = (open().await, open().await);
        first
            .insert_many("counters", vec![doc(json!({"name": "visits", "v": 0}))])
            .await
            .unwrap();

        let filter = doc(json!({"name": "visits"}));
        let inc = doc(json!({"$inc": {"v": 1}}));
        tokio::join!(
            bump(&first, &filter, &inc),
            bump(&second, &filter, &inc)
        );

        let found = first.find("counters", &filter).await.unwrap();
        assert_eq!(found[0]["v"], json!(20));
    }

    #[tokio::test]
    async fn test_failed_update_leaves_store_usable() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;
        store
            .insert_many("doctors", vec![doc(json!({"name": "Ann", "years": "many"}))])
            .await
            .unwrap();

        let err = store
            .update_many("doctors", &Document::new(), &doc(json!({"$inc": {"years": 1}})))
            .await;
        assert!(err.is_err());

        let summary = store
            .update_many("doctors", &Document::new(), &doc(json!({"$set": {"years": 3}})))
            .await
            .unwrap();
        assert_eq!(summary, UpdateSummary { matched: 1, modified: 1 });
    }

    #[tokio::test]
    async fn test_drop_collection() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;
        store.insert_many("a", vec![doc(json!({"x": 1}))]).await.unwrap();
        assert!(store.drop_collection("a").await.unwrap());
        assert!(store.find("a", &Document::new()).await.unwrap().is_empty());
        assert!(store.list_collections().await.unwrap().is_empty());
    }
}
