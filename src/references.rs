use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::ops::Range;

use ahash::AHashMap as HashMap;

use crate::types::Slot;

// A cross-reference marker: `[[...]]` with no closing bracket inside
static MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\[([^\]]*)\]\]").unwrap());
static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

/// Raw inner text of every marker, in order of appearance.
pub fn marker_texts(content: &str) -> Vec<String> {
    MARKER
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Byte range of the first digit run inside a marker's inner text.
#[inline]
fn destination_span(marker: &str) -> Option<Range<usize>> {
    NUMBER.find(marker).map(|m| m.range())
}

/// Destination token of every marker that carries one, in order of appearance.
///
/// `"go to [[page 12]] or [[back]]"` yields `["12"]`.
pub fn destination_tokens(content: &str) -> Vec<&str> {
    MARKER
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .filter_map(|inner| {
            destination_span(inner.as_str()).map(|span| &inner.as_str()[span])
        })
        .collect()
}

/// Replace the destination token of every marker that names a known node.
///
/// Only the first digit run inside each marker is touched; markers pointing at
/// unknown nodes, and everything outside the token, are copied verbatim.
pub fn rewrite_destinations(content: &str, mapping: &HashMap<&str, Slot>) -> String {
    MARKER
        .replace_all(content, |caps: &Captures| {
            let whole = &caps[0];
            let inner = &caps[1];
            match destination_span(inner) {
                Some(span) => match mapping.get(&inner[span.clone()]) {
                    Some(new_id) => format!(
                        "[[{}{}{}]]",
                        &inner[..span.start],
                        new_id,
                        &inner[span.end..]
                    ),
                    None => whole.to_string(),
                },
                None => whole.to_string(),
            }
        })
        .into_owned()
}
