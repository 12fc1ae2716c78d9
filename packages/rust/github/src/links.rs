//! CSV attachment links in issue bodies.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;
use url::Url;

/// Markdown link whose target is an https URL ending in `.csv`.
static CSV_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*?\]\((https://[^)\s]*?\.csv)\)").expect("valid regex"));

/// Markdown link whose target ends in `.csv`, any scheme.
static ANY_CSV_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*?\]\(([^)\s]*?\.csv)\)").expect("valid regex"));

/// Every CSV link in `body`, in order of first appearance, without duplicates.
pub fn extract_csv_links(body: &str) -> Vec<Url> {
    let mut links: Vec<Url> = Vec::new();
    for caps in CSV_LINK_RE.captures_iter(body) {
        let raw = &caps[1];
        match Url::parse(raw) {
            Ok(url) if !links.contains(&url) => links.push(url),
            Ok(_) => {}
            Err(e) => debug!(link = raw, error = %e, "ignoring malformed CSV link"),
        }
    }
    links
}

/// Whether `body` links to at least one CSV file, whatever the link scheme.
///
/// Only https links are downloadable; see [`extract_csv_links`].
pub fn has_csv_link(body: &str) -> bool {
    ANY_CSV_LINK_RE.is_match(body)
}
