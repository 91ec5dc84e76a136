//! Read-only query layer over the live index generation.
//!
//! Full-text operations rank with FTS5 `bm25()`. SQLite reports lower values
//! for better matches, so scores are returned as absolute values where higher
//! means more relevant. A query the FTS5 parser rejects is logged and answered
//! with an empty list.
//!
//! Structured lookups (identifiers, sections, slugs) read `doc_metadata`.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use tracing::warn;

use crate::config::{Config, RetrievalConfig};
use crate::error::StoreError;
use crate::migrate::FTS_BODY_COLUMN;
use crate::models::{DocSummary, ExampleHit, FullDoc, IdentifierHit, SearchHit, VariantHit};
use crate::taxonomy::doc_url;

const MARK_OPEN: &str = "<mark>";
const MARK_CLOSE: &str = "</mark>";
const ELLIPSIS: &str = "...";

/// Phrases appended to a variant name to widen recall.
const VARIANT_SUFFIXES: [&str; 3] = ["state", "variant", "modifier"];

/// Query engine. Cheap to clone; all clones share one pool.
#[derive(Clone)]
pub struct SearchEngine {
    pool: SqlitePool,
    root_marker: String,
    extension: String,
    base_url: String,
    limits: RetrievalConfig,
}

impl SearchEngine {
    pub fn new(pool: SqlitePool, config: &Config) -> Self {
        Self {
            pool,
            root_marker: config.source.root_marker.clone(),
            extension: config.source.extension.clone(),
            base_url: config.source.base_url.clone(),
            limits: config.retrieval.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        doc_url(path, &self.root_marker, &self.extension, &self.base_url)
    }

    /// Ranked full-text search over title, body, section and description.
    pub async fn full_text_search(
        &self,
        query: &str,
        limit: Option<i64>,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let limit = clamp_limit(limit, self.limits.default_search, self.limits.max_search);
        self.ranked(query, limit).await
    }

    async fn ranked(&self, query: &str, limit: i64) -> Result<Vec<SearchHit>, StoreError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT path, title, section, description,
                    snippet(doc_fts, {}, ?, ?, ?, ?) AS excerpt,
                    bm25(doc_fts) AS rank
             FROM doc_fts
             WHERE doc_fts MATCH ?
             ORDER BY rank
             LIMIT ?",
            FTS_BODY_COLUMN
        );

        let rows = sqlx::query(&sql)
            .bind(MARK_OPEN)
            .bind(MARK_CLOSE)
            .bind(ELLIPSIS)
            .bind(self.limits.excerpt_tokens)
            .bind(query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await;

        let rows = recover_query(query, rows)?;
        Ok(rows.iter().map(|row| self.search_hit(row)).collect())
    }

    fn search_hit(&self, row: &SqliteRow) -> SearchHit {
        let path: String = row.get("path");
        let rank: f64 = row.get("rank");
        SearchHit {
            url: self.url(&path),
            title: row.get("title"),
            section: row.get("section"),
            description: row.get("description"),
            excerpt: row.get("excerpt"),
            score: rank.abs(),
            path,
        }
    }

    /// Documents whose identifier set contains `token` exactly.
    ///
    /// Ordered by path.
    pub async fn lookup_by_identifier(&self, token: &str) -> Result<Vec<IdentifierHit>, StoreError> {
        if token.is_empty() {
            return Ok(Vec::new());
        }

        // Prefilter on the serialized token, then confirm after decoding.
        let needle = format!("%{}%", escape_like(&serde_json::to_string(token)?));
        let rows = sqlx::query(
            "SELECT path, title, section, identifiers_json FROM doc_metadata
             WHERE identifiers_json LIKE ? ESCAPE '\\'
             ORDER BY path",
        )
        .bind(needle)
        .fetch_all(&self.pool)
        .await?;

        let mut hits = Vec::new();
        for row in rows {
            let identifiers: Vec<String> = serde_json::from_str(row.get("identifiers_json"))?;
            if !identifiers.iter().any(|t| t == token) {
                continue;
            }
            let path: String = row.get("path");
            hits.push(IdentifierHit {
                url: self.url(&path),
                title: row.get("title"),
                section: row.get("section"),
                token: token.to_string(),
                path,
            });
        }
        Ok(hits)
    }

    /// Distinct non-empty section labels, ascending.
    pub async fn list_sections(&self) -> Result<Vec<String>, StoreError> {
        let sections = sqlx::query_scalar(
            "SELECT DISTINCT section FROM doc_metadata WHERE section != '' ORDER BY section",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(sections)
    }

    /// Documents in `section` (exact, case-sensitive), ordered by title.
    pub async fn list_by_section(&self, section: &str) -> Result<Vec<DocSummary>, StoreError> {
        let rows = sqlx::query(
            "SELECT path, title, section FROM doc_metadata
             WHERE section = ?
             ORDER BY title, path",
        )
        .bind(section)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| self.summary(row)).collect())
    }

    /// Every document, ordered by section then title.
    pub async fn list_documents(&self) -> Result<Vec<DocSummary>, StoreError> {
        let rows = sqlx::query(
            "SELECT path, title, section FROM doc_metadata ORDER BY section, title, path",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| self.summary(row)).collect())
    }

    fn summary(&self, row: &SqliteRow) -> DocSummary {
        let path: String = row.get("path");
        DocSummary {
            url: self.url(&path),
            title: row.get("title"),
            section: row.get("section"),
            path,
        }
    }

    /// The document whose path ends with `/<slug>.<extension>`.
    ///
    /// When several documents share a slug the lexicographically smallest
    /// path wins.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<FullDoc>, StoreError> {
        if slug.trim().is_empty() {
            return Ok(None);
        }

        let suffix = format!("/{}.{}", slug, self.extension);
        // LIKE is ASCII case-insensitive; the exact suffix check below is not.
        let rows = sqlx::query(
            "SELECT m.path, m.title, m.section, m.description,
                    m.identifiers_json, m.samples_json, f.body
             FROM doc_metadata m
             JOIN doc_fts f ON f.path = m.path
             WHERE m.path LIKE ? ESCAPE '\\'
             ORDER BY m.path",
        )
        .bind(format!("%{}", escape_like(&suffix)))
        .fetch_all(&self.pool)
        .await?;

        let Some(row) = rows
            .iter()
            .find(|row| row.get::<String, _>("path").ends_with(&suffix))
        else {
            return Ok(None);
        };

        let path: String = row.get("path");
        Ok(Some(FullDoc {
            url: self.url(&path),
            title: row.get("title"),
            section: row.get("section"),
            body: row.get("body"),
            description: row.get("description"),
            identifiers: serde_json::from_str(row.get("identifiers_json"))?,
            code_samples: serde_json::from_str(row.get("samples_json"))?,
            path,
        }))
    }

    /// Ranked search restricted to documents that carry code samples.
    pub async fn get_code_samples(
        &self,
        query: &str,
        limit: Option<i64>,
    ) -> Result<Vec<ExampleHit>, StoreError> {
        let limit = clamp_limit(limit, self.limits.default_examples, self.limits.max_examples);
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT m.path, m.title, m.section, m.samples_json, bm25(doc_fts) AS rank
             FROM doc_fts
             JOIN doc_metadata m ON m.path = doc_fts.path
             WHERE doc_fts MATCH ? AND m.sample_count > 0
             ORDER BY rank
             LIMIT ?",
        )
        .bind(query)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;

        let rows = recover_query(query, rows)?;
        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            let path: String = row.get("path");
            let rank: f64 = row.get("rank");
            hits.push(ExampleHit {
                url: self.url(&path),
                title: row.get("title"),
                section: row.get("section"),
                code_samples: serde_json::from_str(row.get("samples_json"))?,
                score: rank.abs(),
                path,
            });
        }
        Ok(hits)
    }

    /// Ranked search for a variant name and its informal phrasings.
    pub async fn search_variant(
        &self,
        variant: &str,
        limit: Option<i64>,
    ) -> Result<Vec<VariantHit>, StoreError> {
        let limit = clamp_limit(limit, self.limits.default_variant, self.limits.max_variant);
        let variant = variant.trim();
        if variant.is_empty() {
            return Ok(Vec::new());
        }

        let hits = self.ranked(&variant_query(variant), limit).await?;
        Ok(hits
            .into_iter()
            .map(|hit| VariantHit {
                hit,
                variant_name: variant.to_string(),
            })
            .collect())
    }

    /// Identifier token to the sorted paths that use it.
    pub async fn identifier_mapping(&self) -> Result<BTreeMap<String, Vec<String>>, StoreError> {
        let rows = sqlx::query("SELECT path, identifiers_json FROM doc_metadata ORDER BY path")
            .fetch_all(&self.pool)
            .await?;

        let mut mapping: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for row in rows {
            let path: String = row.get("path");
            let identifiers: Vec<String> = serde_json::from_str(row.get("identifiers_json"))?;
            for token in identifiers {
                mapping.entry(token).or_default().push(path.clone());
            }
        }
        Ok(mapping)
    }
}

/// Resolve a requested limit into `[1, max]`, falling back to `default`.
pub fn clamp_limit(requested: Option<i64>, default: i64, max: i64) -> i64 {
    requested.unwrap_or(default).clamp(1, max.max(1))
}

/// FTS5 expression for a variant:
/// `"v:" OR v OR "v state" OR "v variant" OR "v modifier"`.
///
/// The bare term is quoted when it is not a plain FTS5 bareword.
pub fn variant_query(variant: &str) -> String {
    let mut terms = vec![quote_phrase(&format!("{}:", variant))];
    terms.push(if is_bareword(variant) {
        variant.to_string()
    } else {
        quote_phrase(variant)
    });
    for suffix in VARIANT_SUFFIXES {
        terms.push(quote_phrase(&format!("{} {}", variant, suffix)));
    }
    terms.join(" OR ")
}

fn quote_phrase(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

fn is_bareword(term: &str) -> bool {
    !term.is_empty()
        && !matches!(term, "AND" | "OR" | "NOT" | "NEAR")
        && term.chars().all(|c| c.is_alphanumeric() || c == '_')
}

fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Database errors raised by a MATCH query are query-syntax failures.
fn recover_query<T>(query: &str, result: Result<Vec<T>, sqlx::Error>) -> Result<Vec<T>, StoreError> {
    match result {
        Ok(rows) => Ok(rows),
        Err(sqlx::Error::Database(err)) => {
            warn!(query, error = %err, "full-text query rejected");
            Ok(Vec::new())
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::models::IndexEntry;
    use crate::store::IndexStore;
    use crate::test_support::temp_store;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
[db]
path = "unused.sqlite"

[source]
path = "unused"
base_url = "https://example.com/docs"

[retrieval]
max_search = 3
default_search = 2
"#;

    fn entry(path: &str, title: &str, section: &str, body: &str) -> IndexEntry {
        IndexEntry {
            path: path.to_string(),
            title: title.to_string(),
            section: section.to_string(),
            description: String::new(),
            body: body.to_string(),
            identifiers: crate::parser::extract_identifiers(body).into_iter().collect(),
            code_samples: crate::parser::extract_code_samples(body),
        }
    }

    fn fixture() -> Vec<IndexEntry> {
        vec![
            entry(
                "/m/src/docs/flex.mdx",
                "Flex",
                "Core",
                "Use flex to grow.\n<div class=\"flex-1 text-center\"></div>",
            ),
            entry(
                "/m/src/docs/grid.mdx",
                "Grid",
                "Core",
                "Grid layouts.\n```html\n<div class=\"grid grid-cols-2\"></div>\n```\n",
            ),
            entry(
                "/m/src/docs/layout/display.mdx",
                "Display",
                "Layout",
                "Display utilities control the display box type of an element.",
            ),
            entry(
                "/m/src/docs/layout/columns.mdx",
                "Columns",
                "Layout",
                "Columns utilities for multi column layout of an element.",
            ),
            entry(
                "/m/src/docs/states/hover-focus.mdx",
                "Hover, Focus",
                "States",
                "Style on pointer over with hover:bg-blue-500 in markup.",
            ),
            entry(
                "/m/notes/element.mdx",
                "Element notes",
                "General",
                "Another element mention for the element query.",
            ),
        ]
    }

    async fn engine(tmp: &TempDir) -> (IndexStore, SearchEngine) {
        let store = temp_store(tmp).await;
        store.replace_all(&fixture()).await.unwrap();
        let config = parse_config(CONFIG).unwrap();
        let engine = SearchEngine::new(store.pool().clone(), &config);
        (store, engine)
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(Some(0), 10, 50), 1);
        assert_eq!(clamp_limit(Some(-7), 10, 50), 1);
        assert_eq!(clamp_limit(Some(500), 10, 50), 50);
        assert_eq!(clamp_limit(Some(12), 10, 50), 12);
        assert_eq!(clamp_limit(None, 10, 50), 10);
    }

    #[test]
    fn test_variant_query_shape() {
        assert_eq!(
            variant_query("hover"),
            r#""hover:" OR hover OR "hover state" OR "hover variant" OR "hover modifier""#
        );
    }

    #[test]
    fn test_variant_query_quotes_non_barewords() {
        let q = variant_query("group-hover");
        assert!(q.contains(r#" OR "group-hover" OR "#));
        let q = variant_query("say \"hi\"");
        assert!(q.starts_with(r#""say ""hi"":""#));
        assert!(variant_query("OR").contains(r#" OR "OR" OR "#));
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("a_b%c\\"), "a\\_b\\%c\\\\");
    }

    #[tokio::test]
    async fn test_full_text_search_ranks_and_marks() {
        let tmp = TempDir::new().unwrap();
        let (_store, engine) = engine(&tmp).await;

        let hits = engine.full_text_search("display", None).await.unwrap();
        assert_eq!(hits[0].path, "/m/src/docs/layout/display.mdx");
        assert_eq!(hits[0].url, "https://example.com/docs/layout/display");
        assert!(hits[0].excerpt.contains("<mark>"));
        assert!(hits[0].score > 0.0);
    }

    #[tokio::test]
    async fn test_full_text_search_clamps_limit() {
        let tmp = TempDir::new().unwrap();
        let (_store, engine) = engine(&tmp).await;

        // "element" matches three documents; max_search is 3, default 2.
        assert_eq!(engine.full_text_search("element", Some(0)).await.unwrap().len(), 1);
        assert_eq!(engine.full_text_search("element", Some(-1)).await.unwrap().len(), 1);
        assert_eq!(engine.full_text_search("element", None).await.unwrap().len(), 2);
        assert_eq!(engine.full_text_search("element", Some(99)).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_malformed_query_yields_no_results() {
        let tmp = TempDir::new().unwrap();
        let (_store, engine) = engine(&tmp).await;

        assert!(engine.full_text_search("\"unbalanced", None).await.unwrap().is_empty());
        assert!(engine.full_text_search("AND OR", None).await.unwrap().is_empty());
        assert!(engine.full_text_search("   ", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_by_identifier_is_exact() {
        let tmp = TempDir::new().unwrap();
        let (_store, engine) = engine(&tmp).await;

        let hits = engine.lookup_by_identifier("flex-1").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "/m/src/docs/flex.mdx");
        assert_eq!(hits[0].token, "flex-1");

        assert!(engine.lookup_by_identifier("flex").await.unwrap().is_empty());
        assert!(engine.lookup_by_identifier("Flex-1").await.unwrap().is_empty());
        assert!(engine.lookup_by_identifier("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_sections_sorted_and_distinct() {
        let tmp = TempDir::new().unwrap();
        let (_store, engine) = engine(&tmp).await;

        let sections = engine.list_sections().await.unwrap();
        assert_eq!(sections, vec!["Core", "General", "Layout", "States"]);
    }

    #[tokio::test]
    async fn test_list_by_section_orders_by_title() {
        let tmp = TempDir::new().unwrap();
        let (_store, engine) = engine(&tmp).await;

        let docs = engine.list_by_section("Layout").await.unwrap();
        let titles: Vec<&str> = docs.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["Columns", "Display"]);
        assert!(engine.list_by_section("layout").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_documents_orders_by_section_then_title() {
        let tmp = TempDir::new().unwrap();
        let (_store, engine) = engine(&tmp).await;

        let docs = engine.list_documents().await.unwrap();
        let titles: Vec<&str> = docs.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Flex", "Grid", "Element notes", "Columns", "Display", "Hover, Focus"]
        );
    }

    #[tokio::test]
    async fn test_get_by_slug() {
        let tmp = TempDir::new().unwrap();
        let (_store, engine) = engine(&tmp).await;

        let doc = engine.get_by_slug("grid").await.unwrap().unwrap();
        assert_eq!(doc.path, "/m/src/docs/grid.mdx");
        assert_eq!(doc.identifiers, vec!["grid", "grid-cols-2"]);
        assert_eq!(doc.code_samples.len(), 1);
        assert!(doc.body.starts_with("Grid layouts."));

        assert!(engine.get_by_slug("gri").await.unwrap().is_none());
        assert!(engine.get_by_slug("Grid").await.unwrap().is_none());
        assert!(engine.get_by_slug("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_by_slug_prefers_smallest_path() {
        let tmp = TempDir::new().unwrap();
        let store = temp_store(&tmp).await;
        store
            .replace_all(&[
                entry("/m/src/docs/z/colors.mdx", "Z", "Z", "z"),
                entry("/m/src/docs/a/colors.mdx", "A", "A", "a"),
            ])
            .await
            .unwrap();
        let engine = SearchEngine::new(store.pool().clone(), &parse_config(CONFIG).unwrap());

        let doc = engine.get_by_slug("colors").await.unwrap().unwrap();
        assert_eq!(doc.path, "/m/src/docs/a/colors.mdx");
    }

    #[tokio::test]
    async fn test_code_samples_only_from_documents_with_samples() {
        let tmp = TempDir::new().unwrap();
        let (_store, engine) = engine(&tmp).await;

        let hits = engine.get_code_samples("grid OR flex", Some(10)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "/m/src/docs/grid.mdx");
        assert!(hits[0].code_samples[0].contains("grid-cols-2"));
    }

    #[tokio::test]
    async fn test_search_variant_finds_prefixed_usage() {
        let tmp = TempDir::new().unwrap();
        let (_store, engine) = engine(&tmp).await;

        let hits = engine.search_variant("hover", Some(10)).await.unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].hit.path, "/m/src/docs/states/hover-focus.mdx");
        assert!(hits.iter().all(|h| h.variant_name == "hover"));
    }

    #[tokio::test]
    async fn test_search_variant_matches_body_only_usage() {
        let tmp = TempDir::new().unwrap();
        let store = temp_store(&tmp).await;
        store
            .replace_all(&[
                entry("/m/src/docs/buttons.mdx", "Buttons", "Core", "hover:bg-blue-500"),
                entry("/m/src/docs/flex.mdx", "Flex", "Core", "Use flex to grow."),
            ])
            .await
            .unwrap();
        let engine = SearchEngine::new(store.pool().clone(), &parse_config(CONFIG).unwrap());

        let hits = engine.search_variant("hover", Some(10)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].hit.path, "/m/src/docs/buttons.mdx");
        assert_eq!(hits[0].hit.title, "Buttons");
        assert_eq!(hits[0].variant_name, "hover");
    }

    #[tokio::test]
    async fn test_identifier_mapping() {
        let tmp = TempDir::new().unwrap();
        let (_store, engine) = engine(&tmp).await;

        let mapping = engine.identifier_mapping().await.unwrap();
        assert_eq!(mapping["text-center"], vec!["/m/src/docs/flex.mdx".to_string()]);
        assert_eq!(mapping["grid"], vec!["/m/src/docs/grid.mdx".to_string()]);
        assert!(!mapping.contains_key("{dynamic}"));
    }
}
