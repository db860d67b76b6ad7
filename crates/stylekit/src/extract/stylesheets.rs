//! Stylesheet reference extraction

use crate::extract::resolve_url;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

/// `@import url("...")` with an absolute http(s) URL
static IMPORT_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@import\s+url\(['"](https?://[^'"]+)['"]\)"#).expect("valid @import regex")
});

static LINKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("link[rel][href]").expect("valid link selector"));

static STYLES: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("style").expect("valid style selector"));

/// Returns true if a `rel` attribute lists the `stylesheet` keyword
pub fn is_stylesheet_rel(rel: &str) -> bool {
    rel.split_ascii_whitespace()
        .any(|token| token.eq_ignore_ascii_case("stylesheet"))
}

/// Hrefs of `<link rel="stylesheet">` elements, unresolved
pub fn stylesheet_links(document: &Html) -> impl Iterator<Item = &str> {
    document.select(&LINKS).filter_map(|link| {
        let el = link.value();
        el.attr("rel")
            .filter(|rel| is_stylesheet_rel(rel))
            .and(el.attr("href"))
    })
}

/// Absolute `@import url(...)` targets in a block of CSS
pub fn import_urls(css: &str) -> impl Iterator<Item = &str> {
    IMPORT_URL
        .captures_iter(css)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Absolute URLs of every stylesheet the page references
///
/// Link hrefs are resolved against `base_url`; import URLs are absolute by
/// construction and kept verbatim. Order is first discovery, links first.
pub fn extract_css_urls(document: &Html, base_url: &Url) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for href in stylesheet_links(document) {
        match resolve_url(base_url, href) {
            Ok(url) => {
                let url = String::from(url);
                if seen.insert(url.clone()) {
                    urls.push(url);
                }
            }
            Err(e) => tracing::debug!(error = %e, "Skipping stylesheet link"),
        }
    }

    for style in document.select(&STYLES) {
        let css: String = style.text().collect();
        for url in import_urls(&css) {
            if seen.insert(url.to_string()) {
                urls.push(url.to_string());
            }
        }
    }

    urls
}
