//! HTTP retrieval for pages, images and stylesheets

use crate::error::FetchError;
use crate::DEFAULT_USER_AGENT;
use bytes::Bytes;
use encoding_rs::{Encoding, UTF_8};
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use std::time::Duration;
use tracing::{error, warn};
use url::Url;

/// Connect timeout for every request
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Accept header for page requests
pub(crate) const ACCEPT_HTML: &str = "text/html, application/xhtml+xml, */*;q=0.8";

/// Accept header for image requests
pub(crate) const ACCEPT_IMAGE: &str = "image/*, */*;q=0.8";

/// Accept header for stylesheet requests
pub(crate) const ACCEPT_CSS: &str = "text/css, */*;q=0.1";

/// Build a client with default headers
pub(crate) fn build_client(
    user_agent: Option<&str>,
    accept: &'static str,
) -> Result<reqwest::Client, FetchError> {
    let mut headers = HeaderMap::new();
    let user_agent = user_agent.unwrap_or(DEFAULT_USER_AGENT);
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_USER_AGENT)),
    );
    headers.insert(ACCEPT, HeaderValue::from_static(accept));

    reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(FetchError::ClientBuildError)
}

/// Response limits for one request
#[derive(Debug, Clone, Copy)]
pub(crate) struct Limits {
    /// Time allowed until response headers arrive
    pub first_byte: Duration,
    /// Time allowed for the whole body
    pub body: Duration,
    /// Largest accepted body; `None` for unbounded
    pub max_bytes: Option<usize>,
    /// Keep a partial body when the body deadline passes
    pub allow_partial: bool,
}

/// Successful response body
#[derive(Debug)]
pub(crate) struct Fetched {
    /// Final URL after redirects
    pub url: Url,
    pub content_type: Option<String>,
    pub body: Bytes,
    pub truncated: bool,
}

impl Fetched {
    /// Body decoded with the Content-Type charset, UTF-8 when absent or unknown
    ///
    /// A byte order mark takes precedence over the header.
    pub fn text(&self) -> String {
        let encoding = self
            .content_type
            .as_deref()
            .and_then(charset)
            .and_then(|label| Encoding::for_label(label.as_bytes()))
            .unwrap_or(UTF_8);
        let (text, used, had_errors) = encoding.decode(&self.body);
        if had_errors {
            warn!(url = %self.url, encoding = used.name(), "Replaced malformed bytes in body");
        }
        text.into_owned()
    }
}

/// `charset` parameter of a Content-Type value
fn charset(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

/// GET a URL, failing on any non-success status
pub(crate) async fn get(
    client: &reqwest::Client,
    url: &Url,
    limits: Limits,
) -> Result<Fetched, FetchError> {
    let response = tokio::time::timeout(limits.first_byte, client.get(url.clone()).send())
        .await
        .map_err(|_| FetchError::Timeout)?
        .map_err(FetchError::from_reqwest)?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    if let (Some(max), Some(len)) = (limits.max_bytes, response.content_length()) {
        if len > max as u64 {
            return Err(FetchError::TooLarge { limit: max });
        }
    }

    let final_url = response.url().clone();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let (body, truncated) = read_body_with_timeout(response, limits.body, limits.max_bytes).await?;
    if truncated && !limits.allow_partial {
        return Err(FetchError::Timeout);
    }

    Ok(Fetched {
        url: final_url,
        content_type,
        body,
        truncated,
    })
}

/// Check if a content type is HTML
pub(crate) fn is_html_content_type(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.contains("text/html") || ct.contains("application/xhtml")
}

/// Read response body with timeout, returning partial content if timeout occurs
async fn read_body_with_timeout(
    response: reqwest::Response,
    timeout: Duration,
    max_bytes: Option<usize>,
) -> Result<(Bytes, bool), FetchError> {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        let chunk_future = stream.next();
        let timeout_future = tokio::time::sleep_until(deadline);

        tokio::select! {
            chunk = chunk_future => {
                match chunk {
                    Some(Ok(bytes)) => {
                        body.extend_from_slice(&bytes);
                        if let Some(max) = max_bytes {
                            if body.len() > max {
                                return Err(FetchError::TooLarge { limit: max });
                            }
                        }
                    }
                    Some(Err(e)) => {
                        error!("Error reading body chunk: {}", e);
                        if body.is_empty() {
                            return Err(FetchError::from_reqwest(e));
                        }
                        return Ok((Bytes::from(body), true));
                    }
                    None => {
                        return Ok((Bytes::from(body), false));
                    }
                }
            }
            _ = timeout_future => {
                warn!("Body timeout reached, returning partial content");
                return Ok((Bytes::from(body), true));
            }
        }
    }
}
