//! Per-request SQLite connections.
//!
//! Every database (relational or document) is one SQLite file under the
//! store's `data_dir`. A request opens its own single-connection pool and
//! closes it before returning; nothing is shared between requests.

use anyhow::{bail, Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::future::Future;
use std::path::Path;
use std::str::FromStr;

use chatdb_core::StoreKind;

use crate::config::{validate_database_name, Config};

/// Opening an existing file leaves its journal mode alone; only databases
/// created here are switched to WAL.
async fn open(path: &Path, create: bool) -> Result<SqlitePool> {
    let mut options =
        SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?.create_if_missing(create);
    if create {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open database {}", path.display()))?;

    Ok(pool)
}

/// Open an existing database. A missing file is an error; it is never
/// created on this path.
pub async fn connect(config: &Config, kind: StoreKind, name: &str) -> Result<SqlitePool> {
    validate_database_name(name)?;
    let path = config.database_path(kind, name);
    if !path.is_file() {
        let known = list_databases(config, kind).unwrap_or_default();
        if known.is_empty() {
            bail!("{} database '{}' does not exist ({})", kind, name, path.display());
        }
        bail!(
            "{} database '{}' does not exist ({}); available: {}",
            kind,
            name,
            path.display(),
            known.join(", ")
        );
    }
    open(&path, false).await
}

/// Open a database, creating the file (and its directory) if needed.
pub async fn connect_or_create(config: &Config, kind: StoreKind, name: &str) -> Result<SqlitePool> {
    validate_database_name(name)?;
    let path = config.database_path(kind, name);

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    open(&path, true).await
}

/// Run `f` with `pool`, then close the pool whatever `f` returned.
pub async fn scoped<T, F, Fut>(pool: SqlitePool, f: F) -> T
where
    F: FnOnce(SqlitePool) -> Fut,
    Fut: Future<Output = T>,
{
    let result = f(pool.clone()).await;
    pool.close().await;
    result
}

/// Names of the databases that exist for a store kind.
pub fn list_databases(config: &Config, kind: StoreKind) -> Result<Vec<String>> {
    let dir = &config.store(kind).data_dir;
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("sqlite") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_connect_never_creates() {
        let tmp = TempDir::new().unwrap();
        let config = Config::minimal(tmp.path());

        assert!(connect(&config, StoreKind::Relational, "shop").await.is_err());
        assert!(!config.database_path(StoreKind::Relational, "shop").exists());

        let pool = connect_or_create(&config, StoreKind::Relational, "shop")
            .await
            .unwrap();
        pool.close().await;

        let pool = connect(&config, StoreKind::Relational, "shop").await.unwrap();
        let one: i64 = scoped(pool, |p| async move {
            sqlx::query_scalar("SELECT 1").fetch_one(&p).await.unwrap()
        })
        .await;
        assert_eq!(one, 1);

        assert_eq!(
            list_databases(&config, StoreKind::Relational).unwrap(),
            vec!["shop"]
        );
        assert!(list_databases(&config, StoreKind::Document).unwrap().is_empty());

        let err = connect(&config, StoreKind::Relational, "shp").await.unwrap_err();
        assert!(err.to_string().ends_with("available: shop"));
    }

    #[tokio::test]
    async fn test_rejects_path_like_names() {
        let tmp = TempDir::new().unwrap();
        let config = Config::minimal(tmp.path());
        assert!(connect_or_create(&config, StoreKind::Document, "../x").await.is_err());
    }
}
