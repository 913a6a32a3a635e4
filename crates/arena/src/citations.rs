//! Citation marker renumbering.
//!
//! Agents cite sources with 1-based markers (`[3]`, sometimes wrapped as
//! `%[3]%`) indexing a raw URL list that may contain duplicates. Rendering
//! collapses duplicate URLs and rewrites the markers to point into the
//! collapsed list.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::HashMap;

use crate::models::citation::Citation;

lazy_static! {
    static ref WRAPPED_MARKER: Regex = Regex::new(r"%\[(\d+)\]%").unwrap();
    static ref MARKER: Regex = Regex::new(r"\[(\d+)\]").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedAnswer {
    pub text: String,
    /// Deduplicated citations in order of first appearance
    pub citations: Vec<Citation>,
}

impl RenderedAnswer {
    /// Citations to list under the answer. Withheld until the agent is done.
    pub fn visible_citations(&self, is_complete: bool) -> &[Citation] {
        if is_complete {
            &self.citations
        } else {
            &[]
        }
    }
}

/// Collapse duplicate URLs and point every marker at the collapsed list.
///
/// Markers with no matching raw citation are left as they are. Feeding the
/// output back in with its own citation list changes nothing.
pub fn renumber(text: &str, raw: &[Citation]) -> RenderedAnswer {
    let normalized = WRAPPED_MARKER.replace_all(text, "[$1]");

    let mut citations: Vec<Citation> = Vec::new();
    let mut first_seen: HashMap<&str, usize> = HashMap::new();
    let mut remap: HashMap<usize, usize> = HashMap::new();

    for (i, citation) in raw.iter().enumerate() {
        let position = *first_seen.entry(citation.url.as_str()).or_insert_with(|| {
            citations.push(citation.clone());
            citations.len()
        });
        remap.insert(i + 1, position);
    }

    let text = if remap.is_empty() {
        normalized.into_owned()
    } else {
        MARKER
            .replace_all(&normalized, |caps: &Captures| {
                match caps[1].parse::<usize>().ok().and_then(|n| remap.get(&n)) {
                    Some(mapped) => format!("[{}]", mapped),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    };

    if citations.len() < raw.len() {
        tracing::debug!(
            raw = raw.len(),
            unique = citations.len(),
            "Collapsed duplicate citations"
        );
    }

    RenderedAnswer { text, citations }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(list: &[&str]) -> Vec<Citation> {
        list.iter().map(|u| Citation::new(*u)).collect()
    }

    #[test]
    fn test_duplicate_urls_collapse() {
        let rendered = renumber("see [1] and [3]", &urls(&["a", "b", "a"]));
        assert_eq!(rendered.text, "see [1] and [1]");
        assert_eq!(rendered.citations, urls(&["a", "b"]));
    }

    #[test]
    fn test_wrapped_markers_are_normalized_first() {
        let rendered = renumber("x %[2]% y", &urls(&["a", "b"]));
        assert_eq!(rendered.text, "x [2] y");

        let rendered = renumber("x %[3]% y", &urls(&["a", "b", "b"]));
        assert_eq!(rendered.text, "x [2] y");
    }

    #[test]
    fn test_renumbering_is_idempotent() {
        let raw = urls(&["a", "b", "a", "c", "b"]);
        let once = renumber("[1] [2] [3] [4] [5] [9]", &raw);
        let twice = renumber(&once.text, &once.citations);
        assert_eq!(once, twice);
        assert_eq!(once.text, "[1] [2] [1] [3] [2] [9]");
        assert_eq!(once.citations.len(), 3);
    }

    #[test]
    fn test_markers_stay_literal_without_citations() {
        let rendered = renumber("claim [1] and %[2]%", &[]);
        assert_eq!(rendered.text, "claim [1] and [2]");
        assert!(rendered.citations.is_empty());
    }

    #[test]
    fn test_dangling_marker_is_untouched() {
        let rendered = renumber("[1] [7]", &urls(&["a"]));
        assert_eq!(rendered.text, "[1] [7]");
    }

    #[test]
    fn test_citations_withheld_until_complete() {
        let rendered = renumber("no markers here", &urls(&["a", "a"]));
        assert!(rendered.visible_citations(false).is_empty());
        assert_eq!(rendered.visible_citations(true), urls(&["a"]).as_slice());
    }
}
