//! Palette extraction from inline styles and page images

use crate::extract::resolve_url;
use crate::images::ImageLoader;
use crate::MAX_COLORS;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::future::Future;
use std::sync::LazyLock;
use url::Url;

/// `color:` declarations with a hex or `rgb()` literal
///
/// Also matches suffixed properties such as `background-color:`.
static COLOR_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"color:\s*(#[0-9A-Fa-f]{6}|#[0-9A-Fa-f]{3}|rgb\([^)]+\))")
        .expect("valid color regex")
});

static STYLED_ELEMENTS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[style]").expect("valid style attribute selector"));

static IMAGES: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img[src]").expect("valid img selector"));

/// Insertion-ordered set of color literals
#[derive(Debug, Clone, Default)]
pub struct Palette {
    colors: Vec<String>,
    seen: HashSet<String>,
}

impl Palette {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a color, returning false if it was already present
    pub fn insert(&mut self, color: impl Into<String>) -> bool {
        let color = color.into();
        if self.seen.insert(color.clone()) {
            self.colors.push(color);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// First [`MAX_COLORS`] colors in insertion order
    pub fn into_capped(mut self) -> Vec<String> {
        self.colors.truncate(MAX_COLORS);
        self.colors
    }
}

/// Color literals of the `color:` declarations in a style attribute
pub fn inline_style_colors(style: &str) -> impl Iterator<Item = &str> {
    COLOR_DECLARATION
        .captures_iter(style)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

/// Synchronous half of color extraction
///
/// Holds everything read from the document so the image half can run
/// without borrowing it.
#[derive(Debug, Clone, Default)]
pub struct ColorScan {
    /// Colors from inline styles, in document order
    pub palette: Palette,
    /// Resolved image URLs, in document order
    pub images: Vec<Url>,
}

impl ColorScan {
    /// Read inline style colors and image sources from a document
    pub fn new(document: &Html, base_url: &Url) -> Self {
        let mut palette = Palette::new();
        for element in document.select(&STYLED_ELEMENTS) {
            if let Some(style) = element.value().attr("style") {
                for color in inline_style_colors(style) {
                    palette.insert(color);
                }
            }
        }

        let images = document
            .select(&IMAGES)
            .filter_map(|img| img.value().attr("src"))
            .filter_map(|src| match resolve_url(base_url, src) {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping image");
                    None
                }
            })
            .collect();

        Self { palette, images }
    }

    /// Add image palettes and cap the result
    pub async fn finish(self, loader: &ImageLoader) -> Vec<String> {
        let mut palette = self.palette;
        if !self.images.is_empty() {
            for colors in loader.palettes(self.images).await {
                for color in colors {
                    palette.insert(color);
                }
            }
        }
        palette.into_capped()
    }
}

/// Extract up to [`MAX_COLORS`] unique colors from a page
///
/// The document is only read synchronously; the returned future does not
/// borrow it.
pub fn extract_colors<'a>(
    document: &Html,
    base_url: &Url,
    loader: &'a ImageLoader,
) -> impl Future<Output = Vec<String>> + Send + 'a {
    ColorScan::new(document, base_url).finish(loader)
}
