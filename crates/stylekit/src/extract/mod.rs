//! Style extractors
//!
//! Each extractor reads a parsed [`scraper::Html`] document. Documents are
//! not `Send`, so all document access happens synchronously in
//! [`extract_page`]; only the image half of color extraction is async and
//! it runs on the [`ColorScan`] produced here.

mod colors;
mod stylesheets;
mod typography;

pub use colors::{extract_colors, inline_style_colors, ColorScan, Palette};
pub use stylesheets::{extract_css_urls, import_urls, is_stylesheet_rel, stylesheet_links};
pub use typography::{
    compare_font_sizes, extract_fonts_and_sizes, font_family_names, is_generic_family,
    leading_number, split_leading_number, TypographyCollector, GENERIC_FAMILIES,
};

use crate::error::UrlResolutionError;
use crate::types::Typography;
use scraper::Html;
use url::Url;

/// Resolve an attribute value against the page URL
pub fn resolve_url(base_url: &Url, href: &str) -> Result<Url, UrlResolutionError> {
    base_url.join(href.trim()).map_err(|source| UrlResolutionError {
        href: href.to_string(),
        source,
    })
}

/// Everything the synchronous extractors read from one page
#[derive(Debug, Clone)]
pub struct ExtractedPage {
    pub colors: ColorScan,
    pub typography: Typography,
    pub css_urls: Vec<String>,
    /// Serialized document
    pub html: String,
}

/// Parse markup and run the document-reading part of every extractor
pub fn extract_page(markup: &str, base_url: &Url) -> ExtractedPage {
    let document = Html::parse_document(markup);

    let colors = ColorScan::new(&document, base_url);
    let typography = extract_fonts_and_sizes(&document);
    let css_urls = extract_css_urls(&document, base_url);

    tracing::debug!(
        inline_colors = colors.palette.len(),
        images = colors.images.len(),
        fonts = typography.fonts.len(),
        font_sizes = typography.font_sizes.len(),
        css_urls = css_urls.len(),
        "Extracted page"
    );

    ExtractedPage {
        colors,
        typography,
        css_urls,
        html: document.html(),
    }
}
