//! Analysis entry points
//!
//! Validates the request, fetches the page, runs the extractors and
//! assembles the [`AnalysisResult`]. A failure in any stage fails the whole
//! analysis; failures of individual images or URLs inside a stage do not.

use crate::error::{AnalyzeError, ValidationError};
use crate::extract::{extract_page, ExtractedPage};
use crate::http::{self, Limits, ACCEPT_HTML};
use crate::images::{ImageLoader, DEFAULT_IMAGE_CONCURRENCY, DEFAULT_MAX_IMAGE_BYTES};
use crate::types::{AnalysisRequest, AnalysisResult};
use std::time::Duration;
use url::Url;

/// Time allowed for the page's response headers
const PAGE_FIRST_BYTE_TIMEOUT: Duration = Duration::from_secs(10);

/// Time allowed for the page body; a slower body is analyzed as far as it got
const PAGE_BODY_TIMEOUT: Duration = Duration::from_secs(30);

/// Analysis options that can be configured via the analyzer builder
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// Custom User-Agent
    pub user_agent: Option<String>,
    /// Allow list of URL prefixes
    pub allow_prefixes: Vec<String>,
    /// Block list of URL prefixes
    pub block_prefixes: Vec<String>,
    /// Fetch `<img>` sources and add their dominant colors
    pub extract_images: bool,
    /// Images fetched at once
    pub image_concurrency: usize,
    /// Largest image body accepted
    pub max_image_bytes: usize,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            user_agent: None,
            allow_prefixes: Vec::new(),
            block_prefixes: Vec::new(),
            extract_images: true,
            image_concurrency: DEFAULT_IMAGE_CONCURRENCY,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

/// Analyze a page with default options
pub async fn analyze(req: AnalysisRequest) -> Result<AnalysisResult, AnalyzeError> {
    analyze_with_options(req, AnalyzeOptions::default()).await
}

/// Check a request without touching the network
pub fn validate(req: &AnalysisRequest, options: &AnalyzeOptions) -> Result<Url, ValidationError> {
    let raw = req.url.trim();
    if raw.is_empty() {
        return Err(ValidationError::MissingUrl);
    }

    let url = Url::parse(raw).map_err(ValidationError::InvalidUrl)?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ValidationError::InvalidUrlScheme);
    }

    // Check allow/block lists
    if !options.allow_prefixes.is_empty()
        && !options
            .allow_prefixes
            .iter()
            .any(|prefix| url.as_str().starts_with(prefix))
    {
        return Err(ValidationError::BlockedUrl);
    }

    if options
        .block_prefixes
        .iter()
        .any(|prefix| url.as_str().starts_with(prefix))
    {
        return Err(ValidationError::BlockedUrl);
    }

    Ok(url)
}

/// Analyze a page with custom options
pub async fn analyze_with_options(
    req: AnalysisRequest,
    options: AnalyzeOptions,
) -> Result<AnalysisResult, AnalyzeError> {
    let url = validate(&req, &options)?;
    analyze_url(url, &options, |_| {}).await
}

/// Stage of an analysis, reported before the stage starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Fetch,
    Extract,
}

/// Analyze an already validated URL
pub(crate) async fn analyze_url<F>(
    url: Url,
    options: &AnalyzeOptions,
    mut on_stage: F,
) -> Result<AnalysisResult, AnalyzeError>
where
    F: FnMut(Stage),
{
    on_stage(Stage::Fetch);
    let client = http::build_client(options.user_agent.as_deref(), ACCEPT_HTML)?;
    let limits = Limits {
        first_byte: PAGE_FIRST_BYTE_TIMEOUT,
        body: PAGE_BODY_TIMEOUT,
        max_bytes: None,
        allow_partial: true,
    };
    let page = http::get(&client, &url, limits).await?;

    if let Some(ct) = page.content_type.as_deref() {
        if !http::is_html_content_type(ct) {
            tracing::warn!(
                url = %page.url,
                content_type = ct,
                "Page is not HTML, parsing anyway"
            );
        }
    }
    if page.truncated {
        tracing::warn!(url = %page.url, "Page body truncated, analyzing partial content");
    }

    on_stage(Stage::Extract);
    let markup = page.text();
    let base_url = page.url;

    // Documents are not Send; parse and read them off the async runtime
    let extract_base = base_url.clone();
    let ExtractedPage {
        colors,
        typography,
        css_urls,
        html,
    } = tokio::task::spawn_blocking(move || extract_page(&markup, &extract_base))
        .await
        .map_err(|e| AnalyzeError::Analysis(e.to_string()))?;

    let loader = if options.extract_images {
        ImageLoader::new(options.user_agent.as_deref())?
            .max_bytes(options.max_image_bytes)
            .concurrency(options.image_concurrency)
    } else {
        ImageLoader::disabled()
    };
    let colors = colors.finish(&loader).await;

    tracing::debug!(url = %base_url, colors = colors.len(), "Analysis complete");

    Ok(AnalysisResult {
        url: base_url.to_string(),
        colors,
        fonts: typography.fonts,
        font_sizes: typography.font_sizes,
        css_urls,
        html,
        refined: None,
    })
}
