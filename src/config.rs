//! TOML configuration.
//!
//! The configuration is read once at startup into an explicit [`Config`]
//! value that every component receives by reference. Nothing in the crate
//! reads ambient global state apart from the two deployment overrides
//! applied in [`load_config`].

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable that rebases relative `db.path` and `source.path`.
pub const DATA_DIR_ENV: &str = "DOCMIRROR_DATA_DIR";
/// Environment variable that overrides `server.bind`.
pub const BIND_ENV: &str = "DOCMIRROR_BIND";

/// FTS5 caps snippet windows at 64 tokens.
const MAX_EXCERPT_TOKENS: i64 = 64;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Where the documentation mirror lives and how its paths map to URLs.
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    /// Local checkout root of the mirrored repository.
    pub path: PathBuf,
    /// Documents directory, relative to `path`.
    #[serde(default = "default_docs_dir")]
    pub docs_dir: PathBuf,
    /// Path segment that marks the documents root (taxonomy and URLs).
    #[serde(default = "default_root_marker")]
    pub root_marker: String,
    /// Document file extension, without the dot.
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Public base URL that document URLs are derived from.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Remote to mirror. Without it the source tree is treated as local-only.
    #[serde(default)]
    pub repo_url: Option<String>,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_shallow")]
    pub shallow: bool,
    /// Defaults to `**/*.<extension>` when empty.
    #[serde(default)]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

fn default_docs_dir() -> PathBuf {
    PathBuf::from("src/docs")
}
fn default_root_marker() -> String {
    "docs".to_string()
}
fn default_extension() -> String {
    "mdx".to_string()
}
fn default_base_url() -> String {
    "https://tailwindcss.com/docs".to_string()
}
fn default_branch() -> String {
    "main".to_string()
}
fn default_shallow() -> bool {
    true
}

impl SourceConfig {
    /// Absolute (or config-relative) path of the documents directory.
    pub fn docs_path(&self) -> PathBuf {
        self.path.join(&self.docs_dir)
    }

    /// Include patterns, falling back to every file with the document extension.
    pub fn effective_include_globs(&self) -> Vec<String> {
        if self.include_globs.is_empty() {
            vec![format!("**/*.{}", self.extension)]
        } else {
            self.include_globs.clone()
        }
    }
}

/// Result-limit ceilings and defaults for each query operation.
#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_max_search")]
    pub max_search: i64,
    #[serde(default = "default_max_variant")]
    pub max_variant: i64,
    #[serde(default = "default_max_examples")]
    pub max_examples: i64,
    #[serde(default = "default_search_limit")]
    pub default_search: i64,
    #[serde(default = "default_variant_limit")]
    pub default_variant: i64,
    #[serde(default = "default_examples_limit")]
    pub default_examples: i64,
    #[serde(default = "default_excerpt_tokens")]
    pub excerpt_tokens: i64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_search: default_max_search(),
            max_variant: default_max_variant(),
            max_examples: default_max_examples(),
            default_search: default_search_limit(),
            default_variant: default_variant_limit(),
            default_examples: default_examples_limit(),
            excerpt_tokens: default_excerpt_tokens(),
        }
    }
}

fn default_max_search() -> i64 {
    50
}
fn default_max_variant() -> i64 {
    20
}
fn default_max_examples() -> i64 {
    10
}
fn default_search_limit() -> i64 {
    10
}
fn default_variant_limit() -> i64 {
    10
}
fn default_examples_limit() -> i64 {
    5
}
fn default_excerpt_tokens() -> i64 {
    MAX_EXCERPT_TOKENS
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct IndexConfig {
    /// Let a rebuild that parsed nothing replace a non-empty index.
    #[serde(default)]
    pub allow_empty_generation: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config = parse_config(&content)?;

    if let Ok(data_dir) = std::env::var(DATA_DIR_ENV) {
        config.rebase(Path::new(&data_dir));
    }
    if let Ok(bind) = std::env::var(BIND_ENV) {
        config.server.bind = bind;
    }

    Ok(config)
}

/// Parse and validate configuration text without touching the environment.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

impl Config {
    fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        for (name, max, default) in [
            ("search", r.max_search, r.default_search),
            ("variant", r.max_variant, r.default_variant),
            ("examples", r.max_examples, r.default_examples),
        ] {
            if max < 1 {
                bail!("retrieval.max_{} must be >= 1", name);
            }
            if default < 1 || default > max {
                bail!("retrieval.default_{} must be in [1, {}]", name, max);
            }
        }

        if !(1..=MAX_EXCERPT_TOKENS).contains(&r.excerpt_tokens) {
            bail!("retrieval.excerpt_tokens must be in [1, {}]", MAX_EXCERPT_TOKENS);
        }

        if self.source.root_marker.trim().is_empty() {
            bail!("source.root_marker must not be empty");
        }
        if self.source.extension.trim().is_empty() || self.source.extension.starts_with('.') {
            bail!("source.extension must be non-empty and given without a leading dot");
        }
        if self.source.base_url.ends_with('/') {
            bail!("source.base_url must not end with '/'");
        }

        Ok(())
    }

    /// Re-root relative storage paths under `data_dir`.
    fn rebase(&mut self, data_dir: &Path) {
        if self.db.path.is_relative() {
            self.db.path = data_dir.join(&self.db.path);
        }
        if self.source.path.is_relative() {
            self.source.path = data_dir.join(&self.source.path);
        }
    }
}
