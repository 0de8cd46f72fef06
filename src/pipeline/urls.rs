//! Link discovery in raw message text.

use std::sync::LazyLock;

use regex::Regex;

/// `http://` or `https://` followed by one or more non-whitespace characters.
static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("URL pattern is valid"));

/// All links in `text`, left to right, duplicates kept.
///
/// No validation: trailing punctuation stays part of the match.
pub fn discover_urls(text: &str) -> Vec<&str> {
    URL_PATTERN.find_iter(text).map(|m| m.as_str()).collect()
}
