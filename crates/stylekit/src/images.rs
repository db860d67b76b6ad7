//! Image palette loading
//!
//! Every image is fetched, decoded and reduced to its dominant colors with
//! `color_thief` independently. A failure is logged and yields no colors
//! for that image only.

use crate::error::{FetchError, ImageError};
use crate::http::{self, Limits, ACCEPT_IMAGE};
use crate::IMAGE_PALETTE_SIZE;
use color_thief::ColorFormat;
use futures::stream::{self, StreamExt};
use std::time::Duration;
use url::Url;

/// Default largest image body accepted
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Default number of images fetched at once
pub const DEFAULT_IMAGE_CONCURRENCY: usize = 4;

/// Time allowed for response headers of an image
const IMAGE_FIRST_BYTE_TIMEOUT: Duration = Duration::from_secs(10);

/// Time allowed for an image body
const IMAGE_BODY_TIMEOUT: Duration = Duration::from_secs(20);

/// Pixel sampling step, color-thief's default quality
const SAMPLE_QUALITY: u8 = 10;

/// Pixels more transparent than this are not sampled
const MIN_ALPHA: u8 = 125;

/// Pixels with every channel above this count as white and are not sampled
const WHITE_THRESHOLD: u8 = 250;

/// Fetches images and extracts their dominant colors
#[derive(Debug, Clone)]
pub struct ImageLoader {
    client: Option<reqwest::Client>,
    max_bytes: usize,
    concurrency: usize,
}

impl Default for ImageLoader {
    fn default() -> Self {
        Self::disabled()
    }
}

impl ImageLoader {
    /// Create a loader that fetches with the given User-Agent
    pub fn new(user_agent: Option<&str>) -> Result<Self, FetchError> {
        Ok(Self {
            client: Some(http::build_client(user_agent, ACCEPT_IMAGE)?),
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
            concurrency: DEFAULT_IMAGE_CONCURRENCY,
        })
    }

    /// Loader that never fetches; every image contributes nothing
    pub fn disabled() -> Self {
        Self {
            client: None,
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
            concurrency: DEFAULT_IMAGE_CONCURRENCY,
        }
    }

    /// Set the largest accepted image body
    pub fn max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Set how many images are fetched at once
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Returns true if this loader fetches images
    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Palettes of every image, in input order
    ///
    /// Images are processed concurrently; failed images yield an empty list.
    pub async fn palettes(&self, urls: Vec<Url>) -> Vec<Vec<String>> {
        if !self.is_enabled() {
            tracing::debug!(images = urls.len(), "Image extraction disabled");
            return vec![Vec::new(); urls.len()];
        }

        stream::iter(urls)
            .map(|url| async move {
                match self.palette(&url).await {
                    Ok(colors) => colors,
                    Err(e) => {
                        tracing::warn!(
                            url = %url,
                            error = %e,
                            "Error extracting colors from image"
                        );
                        Vec::new()
                    }
                }
            })
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await
    }

    /// Dominant colors of one image, formatted `rgb(r,g,b)`
    pub async fn palette(&self, url: &Url) -> Result<Vec<String>, ImageError> {
        let Some(client) = &self.client else {
            return Ok(Vec::new());
        };
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ImageError::UnsupportedScheme(url.scheme().to_string()));
        }

        let limits = Limits {
            first_byte: IMAGE_FIRST_BYTE_TIMEOUT,
            body: IMAGE_BODY_TIMEOUT,
            max_bytes: Some(self.max_bytes),
            allow_partial: false,
        };
        let fetched = http::get(client, url, limits).await?;

        tokio::task::spawn_blocking(move || palette_from_bytes(&fetched.body))
            .await
            .map_err(|e| ImageError::Task(e.to_string()))?
    }
}

/// Decode encoded image bytes and take their dominant colors
pub fn palette_from_bytes(bytes: &[u8]) -> Result<Vec<String>, ImageError> {
    let rgba = image::load_from_memory(bytes)?.to_rgba8();
    if !has_sampled_pixels(rgba.as_raw()) {
        return Err(ImageError::NoPixels);
    }

    let colors = color_thief::get_palette(
        rgba.as_raw(),
        ColorFormat::Rgba,
        SAMPLE_QUALITY,
        IMAGE_PALETTE_SIZE as u8,
    )
    .map_err(|e| ImageError::Quantize(format!("{e:?}")))?;

    let mut css: Vec<String> = Vec::with_capacity(colors.len());
    for color in colors {
        let color = format!("rgb({},{},{})", color.r, color.g, color.b);
        if !css.contains(&color) {
            css.push(color);
        }
    }
    if css.is_empty() {
        return Err(ImageError::NoPixels);
    }
    Ok(css)
}

/// Whether any pixel on the sampling grid is opaque enough and not white
fn has_sampled_pixels(rgba: &[u8]) -> bool {
    rgba.chunks_exact(4)
        .step_by(SAMPLE_QUALITY as usize)
        .any(|px| px[3] >= MIN_ALPHA && !px[..3].iter().all(|c| *c > WHITE_THRESHOLD))
}
