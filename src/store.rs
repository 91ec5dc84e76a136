//! Generation-swapped index store.
//!
//! The store keeps exactly one live generation: an FTS5 table for ranked
//! full-text retrieval and a metadata table with the structured projection,
//! both keyed by `path`. [`IndexStore::replace_all`] never edits the live
//! tables in place. It fills a staging pair in one transaction and then, in
//! a second short transaction, drops the live pair and renames the staging
//! pair into place. Readers see the old generation until that commit and the
//! new one after it.

use sha2::{Digest, Sha256};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::error::StoreError;
use crate::migrate::{
    fts_ddl, metadata_ddl, FTS_TABLE, METADATA_TABLE, SECTION_INDEX_DDL, STAGING_SUFFIX,
};
use crate::models::IndexEntry;

/// Metadata about the live generation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct GenerationInfo {
    pub fingerprint: String,
    pub doc_count: i64,
    pub built_at: i64,
}

/// Owner of the persisted index. Only the indexer writes through it.
#[derive(Clone)]
pub struct IndexStore {
    pool: SqlitePool,
}

impl IndexStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Atomically replace the live generation with `entries`.
    pub async fn replace_all(&self, entries: &[IndexEntry]) -> Result<GenerationInfo, StoreError> {
        let fts_next = format!("{}{}", FTS_TABLE, STAGING_SUFFIX);
        let meta_next = format!("{}{}", METADATA_TABLE, STAGING_SUFFIX);
        let now = chrono::Utc::now().timestamp();

        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", fts_next))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", meta_next))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&fts_ddl(&fts_next)).execute(&mut *tx).await?;
        sqlx::query(&metadata_ddl(&meta_next))
            .execute(&mut *tx)
            .await?;

        for entry in entries {
            stage_entry(&mut tx, &fts_next, &meta_next, entry, now).await?;
        }
        tx.commit().await?;
        debug!(count = entries.len(), "staged next generation");

        let info = GenerationInfo {
            fingerprint: fingerprint(entries),
            doc_count: entries.len() as i64,
            built_at: now,
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", FTS_TABLE))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", METADATA_TABLE))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("ALTER TABLE {} RENAME TO {}", fts_next, FTS_TABLE))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!(
            "ALTER TABLE {} RENAME TO {}",
            meta_next, METADATA_TABLE
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query(SECTION_INDEX_DDL).execute(&mut *tx).await?;
        sqlx::query(
            r#"
            INSERT INTO generation (id, fingerprint, doc_count, built_at) VALUES (1, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                fingerprint = excluded.fingerprint,
                doc_count = excluded.doc_count,
                built_at = excluded.built_at
            "#,
        )
        .bind(&info.fingerprint)
        .bind(info.doc_count)
        .bind(info.built_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(info)
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM doc_metadata")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    pub async fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.count().await? == 0)
    }

    /// Number of rows in the full-text view; equals [`count`](Self::count)
    /// after every successful swap.
    #[cfg(test)]
    pub async fn fts_count(&self) -> Result<i64, StoreError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM doc_fts")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    pub async fn generation(&self) -> Result<Option<GenerationInfo>, StoreError> {
        let row = sqlx::query("SELECT fingerprint, doc_count, built_at FROM generation WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| GenerationInfo {
            fingerprint: row.get("fingerprint"),
            doc_count: row.get("doc_count"),
            built_at: row.get("built_at"),
        }))
    }
}

async fn stage_entry(
    tx: &mut Transaction<'_, Sqlite>,
    fts_table: &str,
    meta_table: &str,
    entry: &IndexEntry,
    indexed_at: i64,
) -> Result<(), StoreError> {
    let identifiers_json = serde_json::to_string(&entry.identifiers)?;
    let samples_json = serde_json::to_string(&entry.code_samples)?;

    sqlx::query(&format!(
        "INSERT INTO {} (path, title, body, section, description) VALUES (?, ?, ?, ?, ?)",
        fts_table
    ))
    .bind(&entry.path)
    .bind(&entry.title)
    .bind(&entry.body)
    .bind(&entry.section)
    .bind(&entry.description)
    .execute(&mut **tx)
    .await?;

    sqlx::query(&format!(
        "INSERT INTO {} (path, title, section, description, identifiers_json, samples_json, sample_count, indexed_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        meta_table
    ))
    .bind(&entry.path)
    .bind(&entry.title)
    .bind(&entry.section)
    .bind(&entry.description)
    .bind(&identifiers_json)
    .bind(&samples_json)
    .bind(entry.code_samples.len() as i64)
    .bind(indexed_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// SHA-256 over `(path, body)` pairs in path order.
fn fingerprint(entries: &[IndexEntry]) -> String {
    let mut sorted: Vec<&IndexEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));

    let mut hasher = Sha256::new();
    for entry in sorted {
        hasher.update(entry.path.as_bytes());
        hasher.update([0u8]);
        hasher.update(entry.body.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}
