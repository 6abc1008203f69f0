//! Line wrapping for the display markup.
//!
//! Every line of OCR output becomes a left-aligned `<div>`; blank lines are
//! kept as `<br>` so paragraph breaks survive in the rich-text editor.

/// Opening tag of one line container.
pub const LINE_OPEN: &str = r#"<div style="text-align: left;">"#;
/// Closing tag of one line container.
pub const LINE_CLOSE: &str = "</div>";
/// Content of the container for a blank line.
pub const LINE_BREAK: &str = "<br>";

/// Wrap each `'\n'`-separated line in a container, concatenated without separator.
pub fn wrap_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 2);
    for line in text.split('\n') {
        out.push_str(LINE_OPEN);
        out.push_str(if line.is_empty() { LINE_BREAK } else { line });
        out.push_str(LINE_CLOSE);
    }
    out
}

/// Inverse of [`wrap_lines`]. Returns None if `markup` is not a sequence of
/// line containers.
pub fn unwrap_lines(markup: &str) -> Option<String> {
    let separator = format!("{}{}", LINE_CLOSE, LINE_OPEN);
    let inner = markup.strip_prefix(LINE_OPEN)?.strip_suffix(LINE_CLOSE)?;

    let lines: Vec<&str> = inner
        .split(separator.as_str())
        .map(|line| if line == LINE_BREAK { "" } else { line })
        .collect();
    Some(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_wrap_blank_lines_become_breaks() {
        assert_eq!(
            wrap_lines("a\n\nb"),
            concat!(
                r#"<div style="text-align: left;">a</div>"#,
                r#"<div style="text-align: left;"><br></div>"#,
                r#"<div style="text-align: left;">b</div>"#,
            )
        );
    }

    #[test]
    fn test_page_separator_yields_two_trailing_breaks() {
        let wrapped = wrap_lines("หน้า 1\n\n");
        assert_eq!(wrapped.matches(LINE_BREAK).count(), 2);
        assert!(wrapped.starts_with(r#"<div style="text-align: left;">หน้า 1</div>"#));
    }

    #[test]
    fn test_wrap_empty_text() {
        assert_eq!(wrap_lines(""), r#"<div style="text-align: left;"><br></div>"#);
        assert_eq!(unwrap_lines(&wrap_lines("")).as_deref(), Some(""));
    }

    #[test]
    fn test_unwrap_rejects_foreign_markup() {
        assert_eq!(unwrap_lines("<p>hello</p>"), None);
    }

    proptest! {
        #[test]
        fn prop_unwrap_inverts_wrap(lines in prop::collection::vec("[a-zA-Z0-9ก-๙ .,]{0,16}", 0..8)) {
            let text = lines.join("\n");
            prop_assert_eq!(unwrap_lines(&wrap_lines(&text)), Some(text));
        }
    }
}
