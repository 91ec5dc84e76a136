//! Path-derived taxonomy and public URLs.
//!
//! Both derive from the position of the documents-root marker segment in a
//! document path, e.g. with marker `docs`:
//!
//! | Path | Section | URL |
//! |------|---------|-----|
//! | `repo/src/docs/flex.mdx` | `Core` | `<base>/flex` |
//! | `repo/src/docs/dark-mode/colors.mdx` | `Dark Mode` | `<base>/dark-mode/colors` |
//! | `notes/readme.mdx` | `General` | `<base>` |

use std::path::{Component, Path};

/// Label for documents that sit directly under the documents root.
pub const CORE_SECTION: &str = "Core";
/// Label for documents outside the documents root.
pub const GENERAL_SECTION: &str = "General";

/// Assigns a section label to a document path.
///
/// Implementations must be total and deterministic.
pub trait Taxonomy: Send + Sync {
    fn classify(&self, path: &str) -> String;
}

/// Fallback taxonomy: the directory directly beneath the root marker.
#[derive(Debug, Clone)]
pub struct PathTaxonomy {
    root_marker: String,
}

impl PathTaxonomy {
    pub fn new(root_marker: impl Into<String>) -> Self {
        Self {
            root_marker: root_marker.into(),
        }
    }
}

impl Taxonomy for PathTaxonomy {
    fn classify(&self, path: &str) -> String {
        let parts = segments(path);
        let Some(marker) = parts.iter().position(|p| *p == self.root_marker) else {
            return GENERAL_SECTION.to_string();
        };

        if marker + 1 < parts.len().saturating_sub(1) {
            title_case(&parts[marker + 1].replace('-', " "))
        } else {
            CORE_SECTION.to_string()
        }
    }
}

/// Public URL for a document path.
///
/// Everything up to and including the root marker is stripped, the file
/// extension dropped, and the rest appended to `base_url`. Paths without the
/// marker map to `base_url` itself.
pub fn doc_url(path: &str, root_marker: &str, extension: &str, base_url: &str) -> String {
    let parts = segments(path);
    let Some(marker) = parts.iter().position(|p| *p == root_marker) else {
        return base_url.to_string();
    };

    let mut rest: Vec<&str> = parts[marker + 1..].to_vec();
    if let Some(last) = rest.last_mut() {
        let suffix = format!(".{}", extension);
        if let Some(stem) = last.strip_suffix(suffix.as_str()) {
            *last = stem;
        }
    }

    let joined = rest.join("/");
    if joined.is_empty() {
        base_url.to_string()
    } else {
        format!("{}/{}", base_url, joined)
    }
}

fn segments(path: &str) -> Vec<&str> {
    Path::new(path)
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect()
}

/// Upper-case the first letter of every word, lower-case the rest.
///
/// A "word" starts after any non-alphabetic character, so `2xl` becomes
/// `2Xl`.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://tailwindcss.com/docs";

    fn classify(path: &str) -> String {
        PathTaxonomy::new("docs").classify(path)
    }

    #[test]
    fn test_subdirectory_becomes_section() {
        assert_eq!(classify("/repo/src/docs/dark-mode/colors.mdx"), "Dark Mode");
        assert_eq!(classify("repo/src/docs/typography/font-size.mdx"), "Typography");
    }

    #[test]
    fn test_file_directly_under_root_is_core() {
        assert_eq!(classify("/repo/src/docs/flex.mdx"), CORE_SECTION);
    }

    #[test]
    fn test_missing_marker_is_general() {
        assert_eq!(classify("/repo/src/pages/index.mdx"), GENERAL_SECTION);
        assert_eq!(classify(""), GENERAL_SECTION);
    }

    #[test]
    fn test_marker_as_last_segment_is_core() {
        assert_eq!(classify("/repo/docs"), CORE_SECTION);
    }

    #[test]
    fn test_first_marker_wins() {
        assert_eq!(classify("/docs/guides/docs/x.mdx"), "Guides");
    }

    #[test]
    fn test_classify_is_stable() {
        let path = "/repo/src/docs/border-radius/index.mdx";
        let first = classify(path);
        for _ in 0..10 {
            assert_eq!(classify(path), first);
        }
    }

    #[test]
    fn test_title_case_matches_word_rules() {
        assert_eq!(title_case("dark mode"), "Dark Mode");
        assert_eq!(title_case("SVG"), "Svg");
        assert_eq!(title_case("2xl screens"), "2Xl Screens");
    }

    #[test]
    fn test_url_for_nested_doc() {
        assert_eq!(
            doc_url("/repo/src/docs/dark-mode/colors.mdx", "docs", "mdx", BASE),
            "https://tailwindcss.com/docs/dark-mode/colors"
        );
    }

    #[test]
    fn test_url_for_top_level_doc() {
        assert_eq!(
            doc_url("/repo/src/docs/grid.mdx", "docs", "mdx", BASE),
            "https://tailwindcss.com/docs/grid"
        );
    }

    #[test]
    fn test_url_without_marker_is_base() {
        assert_eq!(doc_url("/repo/README.mdx", "docs", "mdx", BASE), BASE);
        assert_eq!(doc_url("/repo/docs", "docs", "mdx", BASE), BASE);
    }

    #[test]
    fn test_url_keeps_other_extensions() {
        assert_eq!(
            doc_url("/repo/docs/notes.md", "docs", "mdx", BASE),
            "https://tailwindcss.com/docs/notes.md"
        );
    }
}
