//! Full index rebuild.
//!
//! Walks the documents directory, parses every matching file, and hands the
//! surviving records to [`IndexStore::replace_all`] in one call. Files that
//! are skipped or fail to parse only bump the skip count. Rebuilds are
//! serialized: a second caller waits for the one in flight.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::RebuildError;
use crate::models::{IndexEntry, ParseOutcome, RebuildReport};
use crate::parser::DocumentParser;
use crate::store::IndexStore;

#[derive(Clone)]
struct SourceFilter {
    include: GlobSet,
    exclude: GlobSet,
}

impl SourceFilter {
    fn matches(&self, relative: &str) -> bool {
        !self.exclude.is_match(relative) && self.include.is_match(relative)
    }
}

pub struct Indexer {
    store: IndexStore,
    parser: DocumentParser,
    filter: SourceFilter,
    extension: String,
    allow_empty_generation: bool,
    rebuild_lock: Mutex<()>,
}

impl Indexer {
    pub fn new(config: &Config, store: IndexStore, parser: DocumentParser) -> Result<Self, RebuildError> {
        let include = build_globset(&config.source.effective_include_globs())?;

        let mut excludes = vec!["**/.git/**".to_string(), "**/node_modules/**".to_string()];
        excludes.extend(config.source.exclude_globs.clone());
        let exclude = build_globset(&excludes)?;

        Ok(Self {
            store,
            parser,
            filter: SourceFilter { include, exclude },
            extension: config.source.extension.clone(),
            allow_empty_generation: config.index.allow_empty_generation,
            rebuild_lock: Mutex::new(()),
        })
    }

    /// Rebuild the whole index from `source_dir`.
    ///
    /// Parsing runs on the blocking pool. When nothing parses and empty
    /// generations are not allowed, the live generation is kept and the
    /// report has `replaced == false`.
    pub async fn rebuild(&self, source_dir: &Path) -> Result<RebuildReport, RebuildError> {
        let _guard = self.rebuild_lock.lock().await;

        if !source_dir.is_dir() {
            return Err(RebuildError::SourceMissing(source_dir.to_path_buf()));
        }

        let dir = source_dir.to_path_buf();
        let parser = self.parser.clone();
        let filter = self.filter.clone();
        let (entries, skipped) =
            tokio::task::spawn_blocking(move || collect_entries(&dir, &parser, &filter)).await??;

        warn_duplicate_slugs(&entries, &self.extension);

        let mut report = RebuildReport {
            indexed: entries.len(),
            skipped,
            replaced: false,
        };

        if entries.is_empty() && !self.allow_empty_generation {
            warn!(
                skipped,
                dir = %source_dir.display(),
                "no documents parsed; keeping the previous generation"
            );
            return Ok(report);
        }

        let generation = self.store.replace_all(&entries).await?;
        report.replaced = true;

        info!(
            indexed = report.indexed,
            skipped = report.skipped,
            fingerprint = %generation.fingerprint,
            "index rebuilt"
        );
        Ok(report)
    }
}

fn collect_entries(
    dir: &Path,
    parser: &DocumentParser,
    filter: &SourceFilter,
) -> Result<(Vec<IndexEntry>, usize), RebuildError> {
    let mut entries = Vec::new();
    let mut skipped = 0usize;

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(err) if err.depth() == 0 => {
                return Err(RebuildError::SourceUnreadable {
                    path: dir.to_path_buf(),
                    source: err,
                });
            }
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry");
                skipped += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(dir).unwrap_or(path);
        if !filter.matches(&relative.to_string_lossy()) {
            continue;
        }

        match parser.parse_file(path) {
            ParseOutcome::Parsed(record) => {
                entries.push(IndexEntry::from(record));
                if entries.len() % 100 == 0 {
                    debug!(parsed = entries.len(), "parsing documents");
                }
            }
            ParseOutcome::Skip(reason) => {
                warn!(path = %path.display(), %reason, "skipping document");
                skipped += 1;
            }
            ParseOutcome::Failed(err) => {
                warn!(error = %err, "failed to parse document");
                skipped += 1;
            }
        }
    }

    Ok((entries, skipped))
}

/// Slug lookups resolve ties to the smallest path; make the tie visible.
fn warn_duplicate_slugs(entries: &[IndexEntry], extension: &str) {
    let mut by_slug: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    for entry in entries {
        let path = PathBuf::from(&entry.path);
        let is_doc = path.extension().and_then(|e| e.to_str()) == Some(extension);
        if let (true, Some(stem)) = (is_doc, path.file_stem().and_then(|s| s.to_str())) {
            by_slug.entry(stem.to_string()).or_default().push(&entry.path);
        }
    }

    for (slug, paths) in by_slug.iter().filter(|(_, p)| p.len() > 1) {
        warn!(%slug, count = paths.len(), paths = ?paths, "duplicate slug");
    }
}

pub(crate) fn build_globset(patterns: &[String]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::taxonomy::PathTaxonomy;
    use crate::test_support::temp_store;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn test_config(allow_empty: bool) -> Config {
        parse_config(&format!(
            r#"
[db]
path = "unused.sqlite"

[source]
path = "unused"

[index]
allow_empty_generation = {}
"#,
            allow_empty
        ))
        .unwrap()
    }

    fn indexer(config: &Config, store: IndexStore) -> Indexer {
        let parser = DocumentParser::new(Arc::new(PathTaxonomy::new("docs")));
        Indexer::new(config, store, parser).unwrap()
    }

    fn write_doc(dir: &Path, rel: &str, content: &[u8]) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn fixture_tree(tmp: &TempDir) -> PathBuf {
        let docs = tmp.path().join("repo/src/docs");
        write_doc(&docs, "flex.mdx", b"---\ntitle: Flex\n---\n<div class=\"flex-1\"></div>");
        write_doc(&docs, "layout/display.mdx", b"---\ntitle: Display\n---\nblock and inline");
        write_doc(&docs, "layout/broken.mdx", b"---\ntitle: ok\nnot metadata\n---\nx");
        write_doc(&docs, "binary.mdx", &[0xff, 0xfe, 0xfd]);
        write_doc(&docs, "notes.txt", b"not a document");
        write_doc(&docs, "node_modules/pkg/readme.mdx", b"---\ntitle: Vendored\n---\n");
        docs
    }

    #[tokio::test]
    async fn test_rebuild_counts_indexed_and_skipped() {
        let tmp = TempDir::new().unwrap();
        let docs = fixture_tree(&tmp);
        let store = temp_store(&tmp).await;
        let indexer = indexer(&test_config(false), store.clone());

        let report = indexer.rebuild(&docs).await.unwrap();
        assert_eq!(report.indexed, 2);
        assert_eq!(report.skipped, 2);
        assert!(report.replaced);
        assert_eq!(store.count().await.unwrap(), 2);
        assert_eq!(store.fts_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_missing_source_dir_fails() {
        let tmp = TempDir::new().unwrap();
        let store = temp_store(&tmp).await;
        let indexer = indexer(&test_config(false), store);

        let err = indexer.rebuild(&tmp.path().join("nope")).await.unwrap_err();
        assert!(matches!(err, RebuildError::SourceMissing(_)));
    }

    #[tokio::test]
    async fn test_empty_rebuild_keeps_previous_generation() {
        let tmp = TempDir::new().unwrap();
        let docs = fixture_tree(&tmp);
        let store = temp_store(&tmp).await;
        let indexer = indexer(&test_config(false), store.clone());
        indexer.rebuild(&docs).await.unwrap();

        let empty = tmp.path().join("empty");
        write_doc(&empty, "bad.mdx", &[0xc3, 0x28]);
        let report = indexer.rebuild(&empty).await.unwrap();

        assert_eq!(report.indexed, 0);
        assert_eq!(report.skipped, 1);
        assert!(!report.replaced);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_empty_rebuild_clears_when_allowed() {
        let tmp = TempDir::new().unwrap();
        let docs = fixture_tree(&tmp);
        let store = temp_store(&tmp).await;
        let indexer = indexer(&test_config(true), store.clone());
        indexer.rebuild(&docs).await.unwrap();

        let empty = tmp.path().join("empty");
        fs::create_dir_all(&empty).unwrap();
        let report = indexer.rebuild(&empty).await.unwrap();

        assert!(report.replaced);
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_rebuilds_are_serialized() {
        let tmp = TempDir::new().unwrap();
        let docs = fixture_tree(&tmp);
        let store = temp_store(&tmp).await;
        let indexer = Arc::new(indexer(&test_config(false), store.clone()));

        let a = {
            let (indexer, docs) = (indexer.clone(), docs.clone());
            tokio::spawn(async move { indexer.rebuild(&docs).await })
        };
        let b = {
            let (indexer, docs) = (indexer.clone(), docs.clone());
            tokio::spawn(async move { indexer.rebuild(&docs).await })
        };

        assert_eq!(a.await.unwrap().unwrap().indexed, 2);
        assert_eq!(b.await.unwrap().unwrap().indexed, 2);
        assert_eq!(store.count().await.unwrap(), 2);
    }
}
