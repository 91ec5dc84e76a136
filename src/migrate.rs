//! Schema definitions.
//!
//! The live generation is the table pair `doc_fts` / `doc_metadata`. A
//! rebuild creates the same pair under the `_next` suffix and renames it
//! into place (see [`crate::store`]), so the DDL is parameterized by table
//! name.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub const FTS_TABLE: &str = "doc_fts";
pub const METADATA_TABLE: &str = "doc_metadata";
pub const STAGING_SUFFIX: &str = "_next";

/// Column order matters: `snippet()` addresses `body` by index.
pub const FTS_BODY_COLUMN: i64 = 2;

pub fn fts_ddl(table: &str) -> String {
    format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS {} USING fts5(
            path UNINDEXED,
            title,
            body,
            section,
            description
        )",
        table
    )
}

pub fn metadata_ddl(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
            path TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            section TEXT NOT NULL,
            description TEXT NOT NULL,
            identifiers_json TEXT NOT NULL DEFAULT '[]',
            samples_json TEXT NOT NULL DEFAULT '[]',
            sample_count INTEGER NOT NULL DEFAULT 0,
            indexed_at INTEGER NOT NULL
        )",
        table
    )
}

pub const SECTION_INDEX_DDL: &str =
    "CREATE INDEX IF NOT EXISTS idx_doc_metadata_section ON doc_metadata(section)";

const GENERATION_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS generation (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        fingerprint TEXT NOT NULL,
        doc_count INTEGER NOT NULL,
        built_at INTEGER NOT NULL
    )
"#;

/// Create the live tables if they are missing. Idempotent.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(&fts_ddl(FTS_TABLE)).execute(pool).await?;
    sqlx::query(&metadata_ddl(METADATA_TABLE))
        .execute(pool)
        .await?;
    sqlx::query(SECTION_INDEX_DDL).execute(pool).await?;
    sqlx::query(GENERATION_DDL).execute(pool).await?;
    Ok(())
}

/// Open the configured database and make sure the schema exists.
pub async fn run_migrations(config: &Config) -> Result<SqlitePool> {
    let pool = db::connect(config).await?;
    ensure_schema(&pool).await?;
    Ok(pool)
}
