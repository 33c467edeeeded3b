//! Database creation and document-store schema.

use anyhow::Result;
use sqlx::SqlitePool;

use chatdb_core::StoreKind;

use crate::config::Config;
use crate::db;

/// Tables backing a document database. Idempotent.
pub async fn ensure_document_schema(pool: &SqlitePool) -> Result<()> {
    // Collections table; rowid gives creation order
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collections (
            name TEXT PRIMARY KEY,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One row per document, body is the JSON text
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            collection TEXT NOT NULL,
            body TEXT NOT NULL,
            FOREIGN KEY (collection) REFERENCES collections(name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection, id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create database `name` of the given kind. Running it again is a no-op.
pub async fn init_database(config: &Config, kind: StoreKind, name: &str) -> Result<()> {
    let pool = db::connect_or_create(config, kind, name).await?;
    db::scoped(pool, |pool| async move {
        match kind {
            StoreKind::Relational => {
                // Touch the file so it is a valid, empty database
                sqlx::query("PRAGMA user_version").execute(&pool).await?;
                Ok::<_, anyhow::Error>(())
            }
            StoreKind::Document => ensure_document_schema(&pool).await,
        }
    })
    .await?;

    tracing::info!(store = %kind, database = name, "database ready");
    Ok(())
}
