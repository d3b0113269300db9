use std::sync::LazyLock;

use regex::Regex;

static DETAIL_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<a href="/info([^"]*)" title="#).unwrap());

/// Pull detail-page path fragments out of one game-list index page, in
/// document order. The site links every title as
/// `<a href="/info/<Title>" title="...">`; the captured fragment keeps its
/// leading slash. Repeated links are kept as-is.
pub fn detail_fragments(html: &str) -> Vec<String> {
    DETAIL_LINK_RE
        .captures_iter(html)
        .map(|caps| caps[1].to_string())
        .collect()
}
