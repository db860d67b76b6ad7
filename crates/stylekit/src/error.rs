//! Error types for StyleKit
//!
//! Stage-level errors ([`ValidationError`], [`FetchError`]) abort an analysis
//! and surface through [`AnalyzeError`]. Item-level errors ([`ImageError`],
//! [`UrlResolutionError`], [`RenderError`]) are logged and recovered where
//! they occur.

use std::time::Duration;
use thiserror::Error;

/// Request rejected before any network access
#[derive(Debug, Error)]
pub enum ValidationError {
    /// URL is missing
    #[error("Missing required parameter: url")]
    MissingUrl,

    /// URL does not parse as an absolute URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[source] url::ParseError),

    /// URL has invalid scheme
    #[error("Invalid URL: must start with http:// or https://")]
    InvalidUrlScheme,

    /// URL is blocked by prefix list
    #[error("Blocked URL: prefix not allowed")]
    BlockedUrl,
}

/// Errors retrieving a resource over HTTP
#[derive(Debug, Error)]
pub enum FetchError {
    /// Failed to build HTTP client
    #[error("Failed to create HTTP client")]
    ClientBuildError(#[source] reqwest::Error),

    /// Request timed out
    #[error("Request timed out")]
    Timeout,

    /// Failed to connect to server
    #[error("Failed to connect to server")]
    ConnectError(#[source] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Failed to fetch {url}: HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// Body exceeded the configured size limit
    #[error("Response body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    /// Other request error
    #[error("Request failed: {0}")]
    RequestError(String),
}

impl FetchError {
    /// Create an error from a reqwest error
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_connect() {
            FetchError::ConnectError(err)
        } else {
            FetchError::RequestError(err.to_string())
        }
    }
}

/// Failure extracting a palette from a single image
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("unsupported image scheme: {0}")]
    UnsupportedScheme(String),

    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    /// Every sampled pixel was transparent or near white
    #[error("image has no usable pixels")]
    NoPixels,

    #[error("palette extraction failed: {0}")]
    Quantize(String),

    #[error("image task failed: {0}")]
    Task(String),
}

/// A relative reference that could not be resolved against the page URL
#[derive(Debug, Error)]
#[error("cannot resolve '{href}': {source}")]
pub struct UrlResolutionError {
    pub href: String,
    #[source]
    pub source: url::ParseError,
}

/// Refinement pass failure; the approximate typography is kept
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render timed out after {0:?}")]
    Timeout(Duration),

    #[error("render failed: {0}")]
    Failed(String),
}

/// Errors returned by an analysis
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Unexpected failure while extracting from the parsed page
    #[error("Analysis failed: {0}")]
    Analysis(String),
}
