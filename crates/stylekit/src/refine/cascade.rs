//! Built-in renderer computing styles with a simplified cascade
//!
//! Markup is parsed into a fresh document owned by a [`RenderContext`].
//! During the settle window the context loads linked stylesheets; whatever
//! has not arrived when the window closes is ignored. Styles are then
//! cascaded from user-agent defaults, external sheets, embedded sheets and
//! inline declarations, with `font-family` and `font-size` inherited and
//! sizes resolved to pixels.

use super::{ComputedStyle, Renderer};
use crate::css::{declared_font, Origin, StyleSheet};
use crate::error::{FetchError, RenderError};
use crate::extract::{resolve_url, split_leading_number, stylesheet_links};
use crate::http::{self, Limits, ACCEPT_CSS};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// Largest external stylesheet accepted
const MAX_STYLESHEET_BYTES: usize = 2 * 1024 * 1024;

/// Initial font size in pixels
const MEDIUM_PX: f64 = 16.0;

/// Initial font family
const INITIAL_FAMILY: &str = "serif";

/// Scale factor of `smaller`/`larger`
const RELATIVE_SCALE: f64 = 1.2;

const USER_AGENT_CSS: &str = r#"
h1 { font-size: 2em }
h2 { font-size: 1.5em }
h3 { font-size: 1.17em }
h4 { font-size: 1em }
h5 { font-size: 0.83em }
h6 { font-size: 0.67em }
small, sub, sup { font-size: smaller }
big { font-size: larger }
code, pre, kbd, samp, tt { font-family: monospace }
"#;

static USER_AGENT_SHEET: LazyLock<StyleSheet> =
    LazyLock::new(|| StyleSheet::parse_with_origin(USER_AGENT_CSS, Origin::UserAgent));

static BASE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("base[href]").expect("valid base selector"));

/// Renderer that cascades declared styles itself
///
/// Clones share the live-context counter.
#[derive(Debug, Clone)]
pub struct CascadeRenderer {
    client: Option<reqwest::Client>,
    live: Arc<AtomicUsize>,
}

impl CascadeRenderer {
    /// Renderer that loads linked stylesheets during the settle window
    pub fn new(user_agent: Option<&str>) -> Result<Self, FetchError> {
        Ok(Self {
            client: Some(http::build_client(user_agent, ACCEPT_CSS)?),
            live: Arc::default(),
        })
    }

    /// Renderer that only uses styles contained in the markup
    pub fn offline() -> Self {
        Self {
            client: None,
            live: Arc::default(),
        }
    }

    /// Number of render contexts currently open
    pub fn live_contexts(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Renderer for CascadeRenderer {
    fn name(&self) -> &'static str {
        "cascade"
    }

    async fn render(
        &self,
        html: &str,
        base_url: Option<&Url>,
        settle: Duration,
    ) -> Result<Vec<ComputedStyle>, RenderError> {
        let mut context = RenderContext::open(html, Arc::clone(&self.live));
        let deadline = Instant::now() + settle;

        if let Some(client) = &self.client {
            let links = context.stylesheet_links(base_url);
            context.external = load_stylesheets(client, links, deadline).await;
        }

        tokio::time::sleep_until(deadline).await;
        Ok(context.compute())
    }
}

/// Isolated document instance, released on drop
struct RenderContext {
    markup: String,
    external: Vec<String>,
    live: Arc<AtomicUsize>,
}

impl RenderContext {
    fn open(markup: &str, live: Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Render context opened");
        Self {
            markup: markup.to_string(),
            external: Vec::new(),
            live,
        }
    }

    /// Absolute URLs of linked stylesheets, honoring `<base href>`
    fn stylesheet_links(&self, base_url: Option<&Url>) -> Vec<Url> {
        let document = Html::parse_document(&self.markup);

        let base = document
            .select(&BASE)
            .next()
            .and_then(|el| el.value().attr("href"))
            .and_then(|href| match base_url {
                Some(base) => resolve_url(base, href).ok(),
                None => Url::parse(href).ok(),
            })
            .or_else(|| base_url.cloned());

        stylesheet_links(&document)
            .filter_map(|href| match &base {
                Some(base) => resolve_url(base, href).ok(),
                None => Url::parse(href).ok(),
            })
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .collect()
    }

    /// Computed styles of every element inside `<body>`
    fn compute(&self) -> Vec<ComputedStyle> {
        let document = Html::parse_document(&self.markup);
        let external: Vec<StyleSheet> = self
            .external
            .iter()
            .map(|css| StyleSheet::parse(css))
            .collect();
        let embedded = StyleSheet::embedded(&document);

        let sheets: Vec<&StyleSheet> = std::iter::once(&*USER_AGENT_SHEET)
            .chain(external.iter())
            .chain(embedded.iter())
            .collect();

        let mut styles = Vec::new();
        let root = document.root_element();
        let initial = Inherited {
            family: INITIAL_FAMILY.to_string(),
            size_px: MEDIUM_PX,
        };
        let root_style = cascade(root, &initial, MEDIUM_PX, &sheets);
        let root_px = root_style.size_px;

        let mut stack: Vec<(ElementRef<'_>, Inherited, bool)> = child_elements(root)
            .map(|child| (child, root_style.clone(), false))
            .collect();
        stack.reverse();

        while let Some((element, parent, in_body)) = stack.pop() {
            let computed = cascade(element, &parent, root_px, &sheets);
            if in_body {
                styles.push(ComputedStyle {
                    font_family: Some(computed.family.clone()),
                    font_size: Some(format_px(computed.size_px)),
                });
            }
            let children_in_body = in_body || element.value().name() == "body";
            let mut children: Vec<_> = child_elements(element)
                .map(|child| (child, computed.clone(), children_in_body))
                .collect();
            children.reverse();
            stack.extend(children);
        }

        styles
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        tracing::debug!("Render context released");
    }
}

/// Inherited font state
#[derive(Debug, Clone)]
struct Inherited {
    family: String,
    size_px: f64,
}

fn child_elements<'a>(element: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    element.children().filter_map(ElementRef::wrap)
}

fn cascade(
    element: ElementRef<'_>,
    parent: &Inherited,
    root_px: f64,
    sheets: &[&StyleSheet],
) -> Inherited {
    let declared = declared_font(element, sheets);

    let family = match declared.family.as_deref().map(str::trim) {
        None | Some("") => parent.family.clone(),
        Some(value)
            if value.eq_ignore_ascii_case("inherit") || value.eq_ignore_ascii_case("unset") =>
        {
            parent.family.clone()
        }
        Some(value) if value.eq_ignore_ascii_case("initial") => INITIAL_FAMILY.to_string(),
        Some(value) => value.to_string(),
    };

    let size_px = declared
        .size
        .as_deref()
        .and_then(|value| resolve_font_size(value, parent.size_px, root_px))
        .unwrap_or(parent.size_px);

    Inherited { family, size_px }
}

/// Resolve a `font-size` value to pixels; `None` means inherit
pub(crate) fn resolve_font_size(value: &str, parent_px: f64, root_px: f64) -> Option<f64> {
    let value = value.trim().to_ascii_lowercase();
    let keyword = match value.as_str() {
        "xx-small" => Some(9.0),
        "x-small" => Some(10.0),
        "small" => Some(13.0),
        "medium" | "initial" => Some(MEDIUM_PX),
        "large" => Some(18.0),
        "x-large" => Some(24.0),
        "xx-large" => Some(32.0),
        "xxx-large" => Some(48.0),
        "smaller" => Some(parent_px / RELATIVE_SCALE),
        "larger" => Some(parent_px * RELATIVE_SCALE),
        "inherit" | "unset" => Some(parent_px),
        _ => None,
    };
    if keyword.is_some() {
        return keyword;
    }

    let (number, unit) = split_leading_number(&value)?;
    if number < 0.0 || !number.is_finite() {
        return None;
    }

    let px = match unit {
        "px" => number,
        "" if number == 0.0 => 0.0,
        "pt" => number * 96.0 / 72.0,
        "pc" => number * 16.0,
        "in" => number * 96.0,
        "cm" => number * 96.0 / 2.54,
        "mm" => number * 96.0 / 25.4,
        "q" => number * 96.0 / 101.6,
        "em" => number * parent_px,
        "ex" | "ch" => number * parent_px * 0.5,
        "rem" => number * root_px,
        "%" => number * parent_px / 100.0,
        _ => return None,
    };
    Some(px)
}

/// Format pixels like a browser's computed value, e.g. `13.3333px`
pub(crate) fn format_px(px: f64) -> String {
    let rounded = (px * 10_000.0).round() / 10_000.0;
    format!("{}px", rounded)
}

/// Fetch stylesheets concurrently, keeping those that arrive before `deadline`
async fn load_stylesheets(
    client: &reqwest::Client,
    urls: Vec<Url>,
    deadline: Instant,
) -> Vec<String> {
    let limits = Limits {
        first_byte: deadline.saturating_duration_since(Instant::now()),
        body: deadline.saturating_duration_since(Instant::now()),
        max_bytes: Some(MAX_STYLESHEET_BYTES),
        allow_partial: false,
    };

    let loads = urls.into_iter().map(|url| async move {
        match tokio::time::timeout_at(deadline, http::get(client, &url, limits)).await {
            Ok(Ok(fetched)) => Some(fetched.text()),
            Ok(Err(e)) => {
                tracing::warn!(url = %url, error = %e, "Error loading stylesheet");
                None
            }
            Err(_) => {
                tracing::debug!(url = %url, "Stylesheet missed the settle window");
                None
            }
        }
    });

    futures::future::join_all(loads)
        .await
        .into_iter()
        .flatten()
        .collect()
}
