//! Pluralization utilities.

/// `"1 page"`, `"3 pages"`, `"0 pages"`.
pub fn plural_count(count: usize, noun: &str) -> String {
    let suffix = if count == 1 { "" } else { "s" };
    format!("{count} {noun}{suffix}")
}
