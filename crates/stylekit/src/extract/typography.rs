//! Font family and font size extraction
//!
//! [`TypographyCollector`] holds the cleaning, filtering and ordering rules
//! shared by the declared-style pass here and the computed-style pass in
//! [`refine`](crate::refine).

use crate::css::{declared_font, StyleSheet};
use crate::types::Typography;
use scraper::{Html, Selector};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::LazyLock;

/// CSS generic family keywords excluded from font output
pub const GENERIC_FAMILIES: [&str; 5] = ["serif", "sans-serif", "monospace", "cursive", "fantasy"];

static ALL_ELEMENTS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("*").expect("valid universal selector"));

/// Returns true for one of the five generic family keywords, any case
pub fn is_generic_family(name: &str) -> bool {
    GENERIC_FAMILIES
        .iter()
        .any(|generic| generic.eq_ignore_ascii_case(name))
}

/// Split a `font-family` value into cleaned, non-generic family names
pub fn font_family_names(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .map(|token| token.trim().replace(['\'', '"'], ""))
        .filter(|name| !name.is_empty() && !is_generic_family(name))
}

/// Numeric prefix of a CSS length, read like JavaScript's `parseFloat`
///
/// `"12px"` gives 12, `".5em"` gives 0.5, `"large"` gives `None`.
pub fn leading_number(value: &str) -> Option<f64> {
    split_leading_number(value).map(|(number, _)| number)
}

/// Numeric prefix and the text after it, e.g. `"1e1px"` gives `(10.0, "px")`
pub fn split_leading_number(value: &str) -> Option<(f64, &str)> {
    let s = value.trim_start();
    let bytes = s.as_bytes();
    let is_digit = |i: usize| bytes.get(i).is_some_and(u8::is_ascii_digit);

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    if s[end..].starts_with("Infinity") {
        end += "Infinity".len();
        return Some((s[..end].parse().ok()?, &s[end..]));
    }

    let int_start = end;
    while is_digit(end) {
        end += 1;
    }
    let mut digits = end - int_start;

    if bytes.get(end) == Some(&b'.') {
        let mut j = end + 1;
        while is_digit(j) {
            j += 1;
        }
        digits += j - (end + 1);
        if digits > 0 {
            end = j;
        }
    }
    if digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut j = end + 1;
        if matches!(bytes.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        let exp_start = j;
        while is_digit(j) {
            j += 1;
        }
        if j > exp_start {
            end = j;
        }
    }

    Some((s[..end].parse().ok()?, &s[end..]))
}

/// Order two sizes by numeric prefix; sizes without one sort last
pub fn compare_font_sizes(a: &str, b: &str) -> Ordering {
    match (leading_number(a), leading_number(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Accumulates fonts and sizes in discovery order, without duplicates
#[derive(Debug, Default)]
pub struct TypographyCollector {
    fonts: Vec<String>,
    seen_fonts: HashSet<String>,
    sizes: Vec<String>,
    seen_sizes: HashSet<String>,
}

impl TypographyCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every usable family name of a `font-family` value
    pub fn add_family(&mut self, value: &str) {
        for name in font_family_names(value) {
            if self.seen_fonts.insert(name.clone()) {
                self.fonts.push(name);
            }
        }
    }

    /// Add a `font-size` value verbatim
    pub fn add_size(&mut self, value: &str) {
        if value.is_empty() {
            return;
        }
        if self.seen_sizes.insert(value.to_string()) {
            self.sizes.push(value.to_string());
        }
    }

    pub fn finish(self) -> Typography {
        let mut font_sizes = self.sizes;
        font_sizes.sort_by(|a, b| compare_font_sizes(a, b));
        Typography {
            fonts: self.fonts,
            font_sizes,
        }
    }
}

/// Declared fonts and sizes of every element
///
/// Reads each element's inline `style` and the rules of the document's
/// embedded `<style>` blocks. Nothing is inherited and external stylesheets
/// are not consulted.
pub fn extract_fonts_and_sizes(document: &Html) -> Typography {
    let sheets = StyleSheet::embedded(document);
    let sheets: Vec<&StyleSheet> = sheets.iter().collect();
    let mut collector = TypographyCollector::new();

    for element in document.select(&ALL_ELEMENTS) {
        let font = declared_font(element, &sheets);
        if let Some(family) = font.family {
            collector.add_family(&family);
        }
        if let Some(size) = font.size {
            collector.add_size(&size);
        }
    }

    collector.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_generic_family() {
        assert!(is_generic_family("serif"));
        assert!(is_generic_family("Sans-Serif"));
        assert!(is_generic_family("MONOSPACE"));
        assert!(!is_generic_family("system-ui"));
        assert!(!is_generic_family("Serif Pro"));
    }

    #[test]
    fn test_font_family_names() {
        let names: Vec<String> =
            font_family_names(r#" "Helvetica Neue", 'Open Sans' , Arial, sans-serif, , CURSIVE"#)
                .collect();
        assert_eq!(names, vec!["Helvetica Neue", "Open Sans", "Arial"]);
    }

    #[test]
    fn test_leading_number() {
        assert_eq!(leading_number("12px"), Some(12.0));
        assert_eq!(leading_number("  2.5em"), Some(2.5));
        assert_eq!(leading_number(".5rem"), Some(0.5));
        assert_eq!(leading_number("-3px"), Some(-3.0));
        assert_eq!(leading_number("1e2%"), Some(100.0));
        assert_eq!(leading_number("1em2"), Some(1.0));
        assert_eq!(leading_number("100%"), Some(100.0));
        assert_eq!(leading_number("large"), None);
        assert_eq!(leading_number("."), None);
        assert_eq!(leading_number(""), None);
    }

    #[test]
    fn test_split_leading_number() {
        assert_eq!(split_leading_number("1e1px"), Some((10.0, "px")));
        assert_eq!(split_leading_number("-2.5E-1em"), Some((-0.25, "em")));
        assert_eq!(split_leading_number("3.px"), Some((3.0, "px")));
        assert_eq!(split_leading_number("1e"), Some((1.0, "e")));
        assert_eq!(split_leading_number("12"), Some((12.0, "")));
    }

    #[test]
    fn test_sizes_sorted_numerically() {
        let mut collector = TypographyCollector::new();
        for size in ["12px", "2em", "100%", "10px", "2px", "12px"] {
            collector.add_size(size);
        }
        let typography = collector.finish();
        assert_eq!(
            typography.font_sizes,
            vec!["2em", "2px", "10px", "12px", "100%"]
        );
    }

    #[test]
    fn test_unparseable_sizes_sort_last() {
        let mut collector = TypographyCollector::new();
        for size in ["large", "14px", "inherit", "1px"] {
            collector.add_size(size);
        }
        let sizes = collector.finish().font_sizes;
        assert_eq!(&sizes[..2], &["1px", "14px"]);
        assert!(sizes[2..].contains(&"large".to_string()));
        assert!(sizes[2..].contains(&"inherit".to_string()));
    }

    #[test]
    fn test_extract_fonts_and_sizes_inline() {
        let doc = Html::parse_document(
            r#"<body style="font-family: 'Roboto', sans-serif; font-size: 16px">
                <h1 style="font-size: 2em; font-family: Georgia, serif">T</h1>
                <p style="font-family: Roboto">p</p>
                <span style="color: red">s</span>
            </body>"#,
        );
        let typography = extract_fonts_and_sizes(&doc);
        assert_eq!(typography.fonts, vec!["Roboto", "Georgia"]);
        assert_eq!(typography.font_sizes, vec!["2em", "16px"]);
    }

    #[test]
    fn test_extract_fonts_and_sizes_embedded_sheet() {
        let doc = Html::parse_document(
            r#"<head><style>
                   p { font-family: "Fira Sans", monospace; font-size: 14px }
               </style></head>
               <body><p>a</p><div>b</div></body>"#,
        );
        let typography = extract_fonts_and_sizes(&doc);
        assert_eq!(typography.fonts, vec!["Fira Sans"]);
        assert_eq!(typography.font_sizes, vec!["14px"]);
    }

    #[test]
    fn test_no_inheritance() {
        let doc = Html::parse_document(r#"<div style="font-size: 9px"><p>x</p></div>"#);
        let typography = extract_fonts_and_sizes(&doc);
        assert_eq!(typography.font_sizes, vec!["9px"]);
        assert!(typography.fonts.is_empty());
    }
}
