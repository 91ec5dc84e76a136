//! Core data models.
//!
//! These types describe a document as it moves through the pipeline: the
//! raw file, the parsed record, the persisted entry, and the result shapes
//! handed back to callers.

use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::error::ParseError;

/// A raw document file addressed by its path.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

/// Normalized facts extracted from one document.
///
/// `identifier_tokens` is a `BTreeSet` so that the same input always
/// serializes to the same bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
    pub path: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub section: String,
    pub identifier_tokens: BTreeSet<String>,
    pub code_samples: Vec<String>,
}

/// Result of parsing one document.
#[derive(Debug)]
pub enum ParseOutcome {
    Parsed(ParsedRecord),
    /// The file is not decodable as the expected markup.
    Skip(String),
    Failed(ParseError),
}

/// One persisted row of an index generation.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub path: String,
    pub title: String,
    pub section: String,
    pub description: String,
    pub body: String,
    pub identifiers: Vec<String>,
    pub code_samples: Vec<String>,
}

impl From<ParsedRecord> for IndexEntry {
    fn from(record: ParsedRecord) -> Self {
        Self {
            path: record.path,
            title: record.title,
            section: record.section,
            description: record.description,
            body: record.body,
            identifiers: record.identifier_tokens.into_iter().collect(),
            code_samples: record.code_samples,
        }
    }
}

/// Counts reported by a rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub indexed: usize,
    pub skipped: usize,
    /// False when the store kept its previous generation.
    pub replaced: bool,
}

/// A ranked full-text match.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub path: String,
    pub title: String,
    pub section: String,
    pub description: String,
    pub excerpt: String,
    pub url: String,
    pub score: f64,
}

/// A ranked full-text match tagged with the variant it was found for.
#[derive(Debug, Clone, Serialize)]
pub struct VariantHit {
    #[serde(flatten)]
    pub hit: SearchHit,
    pub variant_name: String,
}

/// A document that references an identifier token.
#[derive(Debug, Clone, Serialize)]
pub struct IdentifierHit {
    pub path: String,
    pub title: String,
    pub section: String,
    pub url: String,
    pub token: String,
}

/// Lightweight listing of a document.
#[derive(Debug, Clone, Serialize)]
pub struct DocSummary {
    pub path: String,
    pub title: String,
    pub section: String,
    pub url: String,
}

/// Everything stored about one document.
#[derive(Debug, Clone, Serialize)]
pub struct FullDoc {
    pub path: String,
    pub title: String,
    pub section: String,
    pub body: String,
    pub description: String,
    pub identifiers: Vec<String>,
    pub code_samples: Vec<String>,
    pub url: String,
}

/// A ranked document projected down to its code samples.
#[derive(Debug, Clone, Serialize)]
pub struct ExampleHit {
    pub path: String,
    pub title: String,
    pub section: String,
    pub url: String,
    pub code_samples: Vec<String>,
    pub score: f64,
}
