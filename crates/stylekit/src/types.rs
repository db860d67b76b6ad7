//! Core types for StyleKit

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Request to analyze a page
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisRequest {
    /// The page URL to analyze (required, absolute http:// or https:// URL)
    pub url: String,
}

impl AnalysisRequest {
    /// Create a new request with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Style fingerprint of a page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// URL the page was served from, after redirects
    pub url: String,

    /// Palette: unique color literals, at most ten
    pub colors: Vec<String>,

    /// Font family names, generic families excluded
    pub fonts: Vec<String>,

    /// Unique font sizes, ascending by numeric value
    pub font_sizes: Vec<String>,

    /// Absolute URLs of referenced stylesheets
    pub css_urls: Vec<String>,

    /// Serialized document markup, input for the refinement pass
    pub html: String,

    /// True once a refinement pass replaced the typography
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refined: Option<bool>,
}

impl AnalysisResult {
    /// Copy of this result with the typography replaced
    pub fn with_typography(&self, typography: Typography) -> Self {
        Self {
            fonts: typography.fonts,
            font_sizes: typography.font_sizes,
            refined: Some(true),
            ..self.clone()
        }
    }

    /// Typography currently carried by this result
    pub fn typography(&self) -> Typography {
        Typography {
            fonts: self.fonts.clone(),
            font_sizes: self.font_sizes.clone(),
        }
    }
}

/// Fonts and font sizes found on a page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Typography {
    pub fonts: Vec<String>,
    pub font_sizes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_deserialization() {
        let req: AnalysisRequest = serde_json::from_str(r#"{"url":"https://x.test"}"#).unwrap();
        assert_eq!(req.url, "https://x.test");
    }

    #[test]
    fn test_result_uses_camel_case() {
        let result = AnalysisResult {
            url: "https://x.test/".to_string(),
            font_sizes: vec!["12px".to_string()],
            css_urls: vec!["https://x.test/a.css".to_string()],
            ..Default::default()
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"fontSizes\":[\"12px\"]"));
        assert!(json.contains("\"cssUrls\":[\"https://x.test/a.css\"]"));
        // Unrefined results omit the flag
        assert!(!json.contains("refined"));
    }

    #[test]
    fn test_with_typography_keeps_other_fields() {
        let result = AnalysisResult {
            url: "https://x.test/".to_string(),
            colors: vec!["#fff".to_string()],
            fonts: vec!["Arial".to_string()],
            font_sizes: vec!["12px".to_string()],
            css_urls: vec!["https://x.test/a.css".to_string()],
            html: "<html></html>".to_string(),
            refined: None,
        };

        let refined = result.with_typography(Typography {
            fonts: vec!["Inter".to_string()],
            font_sizes: vec!["16px".to_string()],
        });

        assert_eq!(refined.fonts, vec!["Inter"]);
        assert_eq!(refined.font_sizes, vec!["16px"]);
        assert_eq!(refined.colors, result.colors);
        assert_eq!(refined.css_urls, result.css_urls);
        assert_eq!(refined.html, result.html);
        assert_eq!(refined.refined, Some(true));
    }
}
