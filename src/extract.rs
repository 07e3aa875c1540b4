use std::sync::LazyLock;

use regex::Regex;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[\w./?=&%-]+").expect("valid URL regex"));

/// Scan free text for HTTP(S) URLs, in order of appearance.
/// No deduplication: a URL repeated in the message shows up once per occurrence.
pub fn extract_urls(text: &str) -> impl Iterator<Item = &str> {
    URL_RE.find_iter(text).map(|m| m.as_str())
}
