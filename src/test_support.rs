//! Shared fixtures for unit tests.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tempfile::TempDir;

use crate::migrate::ensure_schema;
use crate::store::IndexStore;

/// A migrated WAL-mode store inside `tmp`.
pub async fn temp_store(tmp: &TempDir) -> IndexStore {
    let options = SqliteConnectOptions::new()
        .filename(tmp.path().join("index.sqlite"))
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .unwrap();
    ensure_schema(&pool).await.unwrap();
    IndexStore::new(pool)
}
