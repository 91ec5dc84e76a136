//! Document parser.
//!
//! Turns one raw documentation file into a [`ParsedRecord`]:
//!
//! 1. Split the `---` delimited metadata block from the body.
//! 2. Collect identifier tokens from `class="…"` / `className="…"` attributes.
//! 3. Collect fenced code blocks that look like styling examples.
//! 4. Ask the [`Taxonomy`] for the section label.
//!
//! Undecodable input yields [`ParseOutcome::Skip`]; I/O failures yield
//! [`ParseOutcome::Failed`]. Neither is fatal to a rebuild.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, LazyLock};

use crate::error::ParseError;
use crate::models::{ParseOutcome, ParsedRecord, SourceDocument};
use crate::taxonomy::Taxonomy;

static CLASS_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bclass(?:Name)?="([^"]+)""#).expect("class attribute pattern"));

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[^\n`]*\n(.*?)```").expect("code fence pattern"));

const FRONTMATTER_DELIMITER: &str = "---";

/// Parses documentation files into normalized records.
#[derive(Clone)]
pub struct DocumentParser {
    taxonomy: Arc<dyn Taxonomy>,
}

impl DocumentParser {
    pub fn new(taxonomy: Arc<dyn Taxonomy>) -> Self {
        Self { taxonomy }
    }

    /// Read `path` from disk and parse it.
    pub fn parse_file(&self, path: &Path) -> ParseOutcome {
        match std::fs::read(path) {
            Ok(bytes) => self.parse(&SourceDocument {
                path: path.to_path_buf(),
                bytes,
            }),
            Err(source) => ParseOutcome::Failed(ParseError {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn parse(&self, doc: &SourceDocument) -> ParseOutcome {
        let text = match std::str::from_utf8(&doc.bytes) {
            Ok(t) => t,
            Err(e) => return ParseOutcome::Skip(format!("not valid UTF-8: {}", e)),
        };
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        let (metadata, body) = match split_frontmatter(text) {
            Ok(parts) => parts,
            Err(reason) => return ParseOutcome::Skip(reason),
        };

        let path = doc.path.to_string_lossy().to_string();
        let section = self.taxonomy.classify(&path);

        ParseOutcome::Parsed(ParsedRecord {
            title: metadata.get("title").cloned().unwrap_or_default(),
            description: metadata.get("description").cloned().unwrap_or_default(),
            identifier_tokens: extract_identifiers(body),
            code_samples: extract_code_samples(body),
            body: body.to_string(),
            section,
            path,
        })
    }
}

/// Identifier tokens from every class attribute, minus templated values.
pub fn extract_identifiers(body: &str) -> BTreeSet<String> {
    CLASS_ATTR
        .captures_iter(body)
        .flat_map(|caps| {
            caps.get(1)
                .map(|m| m.as_str())
                .unwrap_or_default()
                .split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .filter(|token| !token.starts_with('{') && !token.starts_with("..."))
        .collect()
}

/// Trimmed fenced blocks that mention `class`, in source order.
pub fn extract_code_samples(body: &str) -> Vec<String> {
    CODE_FENCE
        .captures_iter(body)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|code| !code.is_empty() && code.to_lowercase().contains("class"))
        .map(str::to_string)
        .collect()
}

/// Split a leading `---` metadata block from the body.
///
/// Text without an opening delimiter, or with an opening delimiter that is
/// never closed, has no metadata and is all body.
fn split_frontmatter(text: &str) -> Result<(BTreeMap<String, String>, &str), String> {
    let Some(after_open) = strip_delimiter_line(text) else {
        return Ok((BTreeMap::new(), text.trim()));
    };

    let mut offset = 0;
    for line in after_open.split_inclusive('\n') {
        if line.trim_end() == FRONTMATTER_DELIMITER {
            let block = &after_open[..offset];
            let body = &after_open[offset + line.len()..];
            return Ok((parse_metadata(block)?, body.trim()));
        }
        offset += line.len();
    }

    Ok((BTreeMap::new(), text.trim()))
}

fn strip_delimiter_line(text: &str) -> Option<&str> {
    let first_end = text.find('\n')?;
    if text[..first_end].trim_end() == FRONTMATTER_DELIMITER {
        Some(&text[first_end + 1..])
    } else {
        None
    }
}

/// Parse `key: value` lines with YAML-style quoting and block scalars.
///
/// Nested structures are tolerated but only top-level scalars are kept.
fn parse_metadata(block: &str) -> Result<BTreeMap<String, String>, String> {
    let mut map = BTreeMap::new();
    // (key, folding separator, collected lines) for an open `|` / `>` scalar
    let mut open_block: Option<(String, &'static str, Vec<String>)> = None;

    for (n, line) in block.lines().enumerate() {
        let indented = line.starts_with(' ') || line.starts_with('\t');
        let trimmed = line.trim();

        if indented || trimmed.starts_with("- ") || trimmed == "-" {
            if let Some((_, _, lines)) = open_block.as_mut() {
                lines.push(trimmed.to_string());
            }
            continue;
        }

        if let Some((key, sep, lines)) = open_block.take() {
            map.insert(key, lines.join(sep).trim().to_string());
        }

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let Some((key, value)) = trimmed.split_once(':') else {
            return Err(format!("malformed metadata on line {}: {:?}", n + 2, trimmed));
        };
        let key = key.trim().to_string();
        if key.is_empty() {
            return Err(format!("empty metadata key on line {}", n + 2));
        }

        match value.trim() {
            "|" | "|-" | "|+" => open_block = Some((key, "\n", Vec::new())),
            ">" | ">-" | ">+" => open_block = Some((key, " ", Vec::new())),
            v => {
                map.insert(key, unquote(v));
            }
        }
    }

    if let Some((key, sep, lines)) = open_block {
        map.insert(key, lines.join(sep).trim().to_string());
    }

    Ok(map)
}

fn unquote(value: &str) -> String {
    if value.len() >= 2 {
        if let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
            return inner.replace("\\\"", "\"").replace("\\\\", "\\");
        }
        if let Some(inner) = value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')) {
            return inner.replace("''", "'");
        }
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::PathTaxonomy;
    use std::path::PathBuf;

    fn parser() -> DocumentParser {
        DocumentParser::new(Arc::new(PathTaxonomy::new("docs")))
    }

    fn doc(path: &str, text: &str) -> SourceDocument {
        SourceDocument {
            path: PathBuf::from(path),
            bytes: text.as_bytes().to_vec(),
        }
    }

    fn parsed(outcome: ParseOutcome) -> ParsedRecord {
        match outcome {
            ParseOutcome::Parsed(r) => r,
            other => panic!("expected a parsed record, got {:?}", other),
        }
    }

    const FLEX_DOC: &str = r#"---
title: Flex
description: "Utilities for controlling how flex items both grow and shrink."
---

## Basic usage

```html
<div class="flex-1 text-center">01</div>
<div className="flex-none {dynamic} ...rest w-14">02</div>
```

```js
module.exports = {}
```
"#;

    #[test]
    fn test_parses_metadata_and_body() {
        let r = parsed(parser().parse(&doc("/repo/src/docs/flex.mdx", FLEX_DOC)));
        assert_eq!(r.title, "Flex");
        assert_eq!(
            r.description,
            "Utilities for controlling how flex items both grow and shrink."
        );
        assert!(r.body.starts_with("## Basic usage"));
        assert!(!r.body.contains("title: Flex"));
        assert_eq!(r.section, "Core");
        assert_eq!(r.path, "/repo/src/docs/flex.mdx");
    }

    #[test]
    fn test_missing_metadata_defaults_to_empty() {
        let r = parsed(parser().parse(&doc("/repo/src/docs/a.mdx", "Just prose.")));
        assert_eq!(r.title, "");
        assert_eq!(r.description, "");
        assert_eq!(r.body, "Just prose.");
    }

    #[test]
    fn test_unclosed_frontmatter_is_body() {
        let text = "---\ntitle: Dangling\nno closing";
        let r = parsed(parser().parse(&doc("/repo/docs/a.mdx", text)));
        assert_eq!(r.title, "");
        assert!(r.body.contains("title: Dangling"));
    }

    #[test]
    fn test_identifiers_filter_dynamic_tokens() {
        let r = parsed(parser().parse(&doc("/repo/src/docs/flex.mdx", FLEX_DOC)));
        let tokens: Vec<&str> = r.identifier_tokens.iter().map(String::as_str).collect();
        assert_eq!(tokens, vec!["flex-1", "flex-none", "text-center", "w-14"]);
        assert!(tokens.iter().all(|t| !t.starts_with('{') && !t.starts_with("...")));
    }

    #[test]
    fn test_identifiers_are_deduplicated_and_case_sensitive() {
        let body = r#"<a class="p-4 P-4"></a><b class="p-4   m-2"></b>"#;
        let tokens = extract_identifiers(body);
        assert_eq!(tokens.len(), 3);
        assert!(tokens.contains("P-4"));
        assert!(tokens.contains("m-2"));
    }

    #[test]
    fn test_identifier_attribute_name_is_case_sensitive() {
        assert!(extract_identifiers(r#"<div CLASS="upper"></div>"#).is_empty());
        assert!(extract_identifiers(r#"<div classname="lower"></div>"#).is_empty());
    }

    #[test]
    fn test_code_samples_require_class_and_content() {
        let r = parsed(parser().parse(&doc("/repo/src/docs/flex.mdx", FLEX_DOC)));
        assert_eq!(r.code_samples.len(), 1);
        assert!(r.code_samples[0].starts_with("<div class=\"flex-1"));
    }

    #[test]
    fn test_code_samples_keep_order_and_duplicates() {
        let body = "```html\n<p class=\"a\"></p>\n```\ntext\n```\n<p CLASS=\"b\"></p>\n```\n```html\n<p class=\"a\"></p>\n```\n";
        let samples = extract_code_samples(body);
        assert_eq!(
            samples,
            vec!["<p class=\"a\"></p>", "<p CLASS=\"b\"></p>", "<p class=\"a\"></p>"]
        );
    }

    #[test]
    fn test_code_sample_match_is_non_greedy() {
        let body = "```\nplain\n```\nbetween class text\n```\nalso plain\n```\n";
        assert!(extract_code_samples(body).is_empty());
    }

    #[test]
    fn test_whitespace_only_block_is_dropped() {
        assert!(extract_code_samples("```html\n   \n```").is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_skipped() {
        let d = SourceDocument {
            path: PathBuf::from("/repo/docs/bad.mdx"),
            bytes: vec![0xff, 0xfe, 0x00, 0x80],
        };
        assert!(matches!(parser().parse(&d), ParseOutcome::Skip(_)));
    }

    #[test]
    fn test_malformed_metadata_is_skipped() {
        let text = "---\ntitle: ok\nthis line has no separator\n---\nbody";
        assert!(matches!(
            parser().parse(&doc("/repo/docs/a.mdx", text)),
            ParseOutcome::Skip(_)
        ));
    }

    #[test]
    fn test_block_scalars_and_quotes() {
        let text = "---\ntitle: 'It''s here'\ndescription: >\n  Folded\n  text\ntags:\n  - a\n  - b\n---\nbody";
        let r = parsed(parser().parse(&doc("/repo/docs/a.mdx", text)));
        assert_eq!(r.title, "It's here");
        assert_eq!(r.description, "Folded text");
    }

    #[test]
    fn test_missing_file_fails() {
        let outcome = parser().parse_file(Path::new("/definitely/not/here.mdx"));
        assert!(matches!(outcome, ParseOutcome::Failed(_)));
    }

    #[test]
    fn test_parse_is_deterministic() {
        let p = parser();
        let d = doc("/repo/src/docs/layout/flex.mdx", FLEX_DOC);
        let a = parsed(p.parse(&d));
        let b = parsed(p.parse(&d));
        assert_eq!(a, b);
        assert_eq!(a.section, "Layout");
    }
}
