//! Index statistics.
//!
//! A quick summary of the live generation: how many documents, sections,
//! identifier tokens and code samples it holds, when it was built, and a
//! per-section breakdown. Used by `docmirror stats`.

use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeSet;
use std::path::Path;

use crate::error::StoreError;
use crate::store::{GenerationInfo, IndexStore};

#[derive(Debug, Clone, Serialize)]
pub struct SectionStats {
    pub section: String,
    pub documents: i64,
    pub code_samples: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub documents: i64,
    pub sections: usize,
    pub identifiers: usize,
    pub code_samples: i64,
    pub generation: Option<GenerationInfo>,
    pub db_size_bytes: u64,
    pub by_section: Vec<SectionStats>,
}

pub async fn collect_stats(store: &IndexStore, db_path: &Path) -> Result<IndexStats, StoreError> {
    let pool: &SqlitePool = store.pool();

    let documents = store.count().await?;
    let code_samples: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(sample_count), 0) FROM doc_metadata")
            .fetch_one(pool)
            .await?;

    let mut identifiers = BTreeSet::new();
    let rows = sqlx::query("SELECT identifiers_json FROM doc_metadata")
        .fetch_all(pool)
        .await?;
    for row in rows {
        let tokens: Vec<String> = serde_json::from_str(row.get("identifiers_json"))?;
        identifiers.extend(tokens);
    }

    let by_section: Vec<SectionStats> = sqlx::query(
        r#"
        SELECT section, COUNT(*) AS documents, COALESCE(SUM(sample_count), 0) AS code_samples
        FROM doc_metadata
        WHERE section != ''
        GROUP BY section
        ORDER BY documents DESC, section
        "#,
    )
    .fetch_all(pool)
    .await?
    .iter()
    .map(|row| SectionStats {
        section: row.get("section"),
        documents: row.get("documents"),
        code_samples: row.get("code_samples"),
    })
    .collect();

    let db_size_bytes = std::fs::metadata(db_path).map(|m| m.len()).unwrap_or(0);

    Ok(IndexStats {
        documents,
        sections: by_section.len(),
        identifiers: identifiers.len(),
        code_samples,
        generation: store.generation().await?,
        db_size_bytes,
        by_section,
    })
}

pub fn print_stats(stats: &IndexStats, db_path: &Path) {
    println!("Docmirror Index Stats");
    println!("=====================");
    println!();
    println!("  Database:     {}", db_path.display());
    println!("  Size:         {}", format_bytes(stats.db_size_bytes));
    match &stats.generation {
        Some(generation) => {
            println!("  Built:        {}", format_ts_relative(generation.built_at));
            println!("  Fingerprint:  {}", &generation.fingerprint[..12.min(generation.fingerprint.len())]);
        }
        None => println!("  Built:        never"),
    }
    println!();
    println!("  Documents:    {}", stats.documents);
    println!("  Sections:     {}", stats.sections);
    println!("  Identifiers:  {}", stats.identifiers);
    println!("  Code samples: {}", stats.code_samples);

    if !stats.by_section.is_empty() {
        println!();
        println!("  By section:");
        println!("  {:<32} {:>6} {:>8}", "SECTION", "DOCS", "SAMPLES");
        println!("  {}", "-".repeat(48));
        for s in &stats.by_section {
            println!("  {:<32} {:>6} {:>8}", s.section, s.documents, s.code_samples);
        }
    }

    println!();
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp relative to now (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IndexEntry;
    use crate::test_support::temp_store;
    use tempfile::TempDir;

    fn entry(path: &str, section: &str, identifiers: &[&str], samples: usize) -> IndexEntry {
        IndexEntry {
            path: path.to_string(),
            title: path.to_string(),
            section: section.to_string(),
            description: String::new(),
            body: "body".to_string(),
            identifiers: identifiers.iter().map(|s| s.to_string()).collect(),
            code_samples: vec!["<p class=\"x\"></p>".to_string(); samples],
        }
    }

    #[tokio::test]
    async fn test_collect_stats() {
        let tmp = TempDir::new().unwrap();
        let store = temp_store(&tmp).await;
        store
            .replace_all(&[
                entry("/d/docs/a.mdx", "Core", &["flex", "p-4"], 2),
                entry("/d/docs/layout/b.mdx", "Layout", &["flex", "grid"], 1),
                entry("/d/docs/layout/c.mdx", "Layout", &[], 0),
            ])
            .await
            .unwrap();

        let stats = collect_stats(&store, &tmp.path().join("index.sqlite")).await.unwrap();
        assert_eq!(stats.documents, 3);
        assert_eq!(stats.sections, 2);
        assert_eq!(stats.identifiers, 3);
        assert_eq!(stats.code_samples, 3);
        assert_eq!(stats.by_section[0].section, "Layout");
        assert_eq!(stats.by_section[0].documents, 2);
        assert!(stats.generation.is_some());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_format_ts_relative() {
        let now = chrono::Utc::now().timestamp();
        assert_eq!(format_ts_relative(now), "just now");
        assert_eq!(format_ts_relative(now - 7200), "2 hours ago");
        assert_eq!(format_ts_relative(now - 86400), "1 day ago");
    }
}
