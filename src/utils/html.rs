//! HTML escaping.

use std::borrow::Cow;

/// Escape text for HTML content and attribute values.
///
/// Borrows when nothing needs escaping.
///
/// # Example
/// ```ignore
/// assert_eq!(escape("Q&A <draft>"), "Q&amp;A &lt;draft&gt;");
/// ```
pub fn escape(s: &str) -> Cow<'_, str> {
    if !s.contains(['<', '>', '&', '"', '\'']) {
        return Cow::Borrowed(s);
    }

    let mut result = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '&' => result.push_str("&amp;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            _ => result.push(c),
        }
    }
    Cow::Owned(result)
}
