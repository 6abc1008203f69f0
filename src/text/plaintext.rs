//! Rich text (editor HTML) to plain text.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;

static SPAN_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</?span\b[^>]*>").unwrap());

/// Convert editor markup to plain text.
///
/// Returns `(plain, without_spans)`: `plain` is every text node, trimmed,
/// joined by a single space; `without_spans` is the markup with `<span>`
/// tags removed and their contents kept in place.
pub fn richtext_to_plaintext(html: &str) -> (String, String) {
    let fragment = Html::parse_fragment(html);
    let plain = fragment
        .root_element()
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let without_spans = SPAN_TAG.replace_all(html, "").into_owned();
    (plain, without_spans)
}
