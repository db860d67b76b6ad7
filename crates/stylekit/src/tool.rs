//! Tool builder and contract for StyleKit

use crate::client::{analyze_url, validate, AnalyzeOptions, Stage};
use crate::error::AnalyzeError;
use crate::refine::{self, RefineConfig, Renderer};
use crate::types::{AnalysisRequest, AnalysisResult};
use crate::{TOOL_DESCRIPTION, TOOL_LLMTXT};
use schemars::schema_for;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Status update during analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeStatus {
    /// Current phase ("validate", "fetch", "extract", "complete")
    pub phase: String,
    /// Optional message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Estimated completion percentage (0-100)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent_complete: Option<f32>,
}

impl AnalyzeStatus {
    /// Create a new status with phase
    pub fn new(phase: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            message: None,
            percent_complete: None,
        }
    }

    /// Set message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Set completion percentage
    pub fn with_percent(mut self, percent: f32) -> Self {
        self.percent_complete = Some(percent);
        self
    }
}

/// Builder for configuring the analyzer
#[derive(Debug, Clone)]
pub struct AnalyzerBuilder {
    options: AnalyzeOptions,
    settle: Duration,
    refine_timeout: Option<Duration>,
}

impl Default for AnalyzerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalyzerBuilder {
    /// Create a new builder with image extraction enabled
    pub fn new() -> Self {
        Self {
            options: AnalyzeOptions::default(),
            settle: refine::DEFAULT_SETTLE,
            refine_timeout: None,
        }
    }

    /// Set custom User-Agent
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.options.user_agent = Some(ua.into());
        self
    }

    /// Add URL prefix to allow list
    pub fn allow_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.options.allow_prefixes.push(prefix.into());
        self
    }

    /// Add URL prefix to block list
    pub fn block_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.options.block_prefixes.push(prefix.into());
        self
    }

    /// Fetch page images for dominant colors
    pub fn extract_images(mut self, enable: bool) -> Self {
        self.options.extract_images = enable;
        self
    }

    /// Images fetched at once (at least one)
    pub fn image_concurrency(mut self, concurrency: usize) -> Self {
        self.options.image_concurrency = concurrency.max(1);
        self
    }

    /// Largest image body accepted
    pub fn max_image_bytes(mut self, max_bytes: usize) -> Self {
        self.options.max_image_bytes = max_bytes;
        self
    }

    /// Wait before computed styles are read during refinement
    pub fn settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Bound on a whole refinement pass, settle window included
    ///
    /// A timeout that does not exceed the settle window is raised at build
    /// time (see [`RefineConfig::new`]).
    pub fn refine_timeout(mut self, timeout: Duration) -> Self {
        self.refine_timeout = Some(timeout);
        self
    }

    /// Build the analyzer
    pub fn build(self) -> Analyzer {
        Analyzer {
            options: self.options,
            refine: RefineConfig::new(self.settle, self.refine_timeout),
        }
    }
}

/// Configured page analyzer
#[derive(Debug, Clone)]
pub struct Analyzer {
    options: AnalyzeOptions,
    refine: RefineConfig,
}

impl Default for Analyzer {
    fn default() -> Self {
        AnalyzerBuilder::new().build()
    }
}

impl Analyzer {
    /// Create a new analyzer builder
    pub fn builder() -> AnalyzerBuilder {
        AnalyzerBuilder::new()
    }

    /// Get tool description
    pub fn description(&self) -> &'static str {
        TOOL_DESCRIPTION
    }

    /// Get full documentation (llmtxt)
    pub fn llmtxt(&self) -> &'static str {
        TOOL_LLMTXT
    }

    /// Get input schema as JSON
    pub fn input_schema(&self) -> serde_json::Value {
        let schema = schema_for!(AnalysisRequest);
        serde_json::to_value(schema).unwrap_or_default()
    }

    /// Get output schema as JSON
    pub fn output_schema(&self) -> serde_json::Value {
        let schema = schema_for!(AnalysisResult);
        serde_json::to_value(schema).unwrap_or_default()
    }

    pub fn options(&self) -> &AnalyzeOptions {
        &self.options
    }

    pub fn refine_config(&self) -> &RefineConfig {
        &self.refine
    }

    /// Analyze the page named by the request
    pub async fn execute(&self, req: AnalysisRequest) -> Result<AnalysisResult, AnalyzeError> {
        let url = validate(&req, &self.options)?;
        analyze_url(url, &self.options, |_| {}).await
    }

    /// Analyze with status updates
    pub async fn execute_with_status<F>(
        &self,
        req: AnalysisRequest,
        mut status_callback: F,
    ) -> Result<AnalysisResult, AnalyzeError>
    where
        F: FnMut(AnalyzeStatus),
    {
        status_callback(AnalyzeStatus::new("validate").with_percent(0.0));

        let url = validate(&req, &self.options)?;

        let result = analyze_url(url, &self.options, |stage| match stage {
            Stage::Fetch => status_callback(AnalyzeStatus::new("fetch").with_percent(10.0)),
            Stage::Extract => status_callback(
                AnalyzeStatus::new("extract")
                    .with_message("Extracting colors and typography")
                    .with_percent(50.0),
            ),
        })
        .await;

        status_callback(AnalyzeStatus::new("complete").with_percent(100.0));

        result
    }

    /// Recompute typography of a result from rendered styles
    pub async fn refine(&self, result: &AnalysisResult, renderer: &dyn Renderer) -> AnalysisResult {
        refine::refine(result, renderer, &self.refine).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    #[test]
    fn test_analyzer_builder() {
        let analyzer = Analyzer::builder()
            .user_agent("TestAgent/1.0")
            .allow_prefix("https://allowed.com")
            .block_prefix("https://blocked.com")
            .extract_images(false)
            .image_concurrency(0)
            .settle(Duration::from_millis(250))
            .build();

        let options = analyzer.options();
        assert_eq!(options.user_agent, Some("TestAgent/1.0".to_string()));
        assert_eq!(options.allow_prefixes, vec!["https://allowed.com"]);
        assert_eq!(options.block_prefixes, vec!["https://blocked.com"]);
        assert!(!options.extract_images);
        assert_eq!(options.image_concurrency, 1);
        assert_eq!(analyzer.refine_config().settle, Duration::from_millis(250));
        assert_eq!(
            analyzer.refine_config().timeout,
            refine::DEFAULT_REFINE_TIMEOUT
        );
    }

    #[test]
    fn test_long_settle_raises_refine_timeout() {
        let analyzer = Analyzer::builder()
            .settle(Duration::from_millis(5100))
            .build();
        let config = analyzer.refine_config();
        assert_eq!(config.settle, Duration::from_millis(5100));
        assert!(config.timeout > config.settle);

        let analyzer = Analyzer::builder()
            .refine_timeout(Duration::from_secs(1))
            .settle(Duration::from_secs(2))
            .build();
        assert_eq!(
            analyzer.refine_config().timeout,
            Duration::from_secs(2) + refine::RENDER_MARGIN
        );
    }

    #[test]
    fn test_analyzer_description() {
        let analyzer = Analyzer::default();
        assert!(!analyzer.description().is_empty());
        assert!(analyzer.llmtxt().contains("fontSizes"));
    }

    #[test]
    fn test_analyzer_schemas() {
        let analyzer = Analyzer::default();
        let input_schema = analyzer.input_schema();
        let output_schema = analyzer.output_schema();

        assert!(input_schema["properties"]["url"].is_object());

        assert!(output_schema["properties"]["colors"].is_object());
        assert!(output_schema["properties"]["fontSizes"].is_object());
        assert!(output_schema["properties"]["cssUrls"].is_object());
    }

    #[tokio::test]
    async fn test_execute_with_status_stops_at_validation() {
        let analyzer = Analyzer::builder().block_prefix("https://blocked.test").build();
        let mut phases = Vec::new();
        let result = analyzer
            .execute_with_status(AnalysisRequest::new("https://blocked.test/x"), |s| {
                phases.push(s.phase)
            })
            .await;

        assert!(matches!(
            result,
            Err(AnalyzeError::Validation(ValidationError::BlockedUrl))
        ));
        assert_eq!(phases, vec!["validate"]);
    }

    #[test]
    fn test_analyze_status() {
        let status = AnalyzeStatus::new("fetch")
            .with_message("Fetching page")
            .with_percent(50.0);

        assert_eq!(status.phase, "fetch");
        assert_eq!(status.message, Some("Fetching page".to_string()));
        assert_eq!(status.percent_complete, Some(50.0));
    }
}
