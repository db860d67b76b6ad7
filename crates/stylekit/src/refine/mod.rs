//! Typography refinement from computed styles
//!
//! The primary analysis only sees declared values. A [`Renderer`] renders
//! the captured markup, waits a fixed settle window so external resources
//! can load, and reports computed `font-family`/`font-size` per element.
//! [`refine`] merges that over the approximation. Refinement is best
//! effort: on error or timeout the original typography stands.

mod cascade;

pub use cascade::CascadeRenderer;

use crate::error::RenderError;
use crate::extract::TypographyCollector;
use crate::types::{AnalysisResult, Typography};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use url::Url;

/// Default wait before computed styles are read
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(1);

/// Render time allowed past the settle window when a timeout is derived
pub const RENDER_MARGIN: Duration = Duration::from_secs(4);

/// Default bound on a whole refinement pass
pub const DEFAULT_REFINE_TIMEOUT: Duration = Duration::from_secs(5);

/// Computed font values of one rendered element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComputedStyle {
    pub font_family: Option<String>,
    pub font_size: Option<String>,
}

/// Renders markup in an isolated document and reads computed styles
///
/// Implementations own their render context and must release it on every
/// exit path, including when the returned future is dropped.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Identifier for logging
    fn name(&self) -> &'static str;

    /// Render `html`, wait `settle`, then read styles of every body element
    ///
    /// `base_url` resolves relative references in the markup.
    async fn render(
        &self,
        html: &str,
        base_url: Option<&Url>,
        settle: Duration,
    ) -> Result<Vec<ComputedStyle>, RenderError>;
}

/// Timing of a refinement pass
#[derive(Debug, Clone, Copy)]
pub struct RefineConfig {
    /// Fixed wait before computed styles are read
    pub settle: Duration,
    /// Bound on the whole render, settle window included
    pub timeout: Duration,
}

impl RefineConfig {
    /// Timing whose timeout always outlasts the settle window
    ///
    /// Without an explicit timeout the default applies, raised to `settle`
    /// plus [`RENDER_MARGIN`] when shorter. An explicit timeout that does not
    /// exceed `settle` is raised the same way.
    pub fn new(settle: Duration, timeout: Option<Duration>) -> Self {
        let floor = settle.saturating_add(RENDER_MARGIN);
        let timeout = match timeout {
            None => DEFAULT_REFINE_TIMEOUT.max(floor),
            Some(timeout) if timeout <= settle => {
                tracing::warn!(
                    settle_ms = settle.as_millis() as u64,
                    timeout_ms = timeout.as_millis() as u64,
                    "Refine timeout does not outlast the settle window, raising it"
                );
                floor
            }
            Some(timeout) => timeout,
        };
        Self { settle, timeout }
    }
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            settle: DEFAULT_SETTLE,
            timeout: DEFAULT_REFINE_TIMEOUT,
        }
    }
}

/// Typography of computed styles, cleaned like the declared pass
pub fn typography_from_styles(styles: &[ComputedStyle]) -> Typography {
    let mut collector = TypographyCollector::new();
    for style in styles {
        if let Some(family) = &style.font_family {
            collector.add_family(family);
        }
        if let Some(size) = &style.font_size {
            collector.add_size(size);
        }
    }
    collector.finish()
}

/// Render the result's markup and return its computed typography
pub async fn try_refine(
    result: &AnalysisResult,
    renderer: &dyn Renderer,
    config: &RefineConfig,
) -> Result<Typography, RenderError> {
    let base_url = Url::parse(&result.url).ok();
    let styles = tokio::time::timeout(
        config.timeout,
        renderer.render(&result.html, base_url.as_ref(), config.settle),
    )
    .await
    .map_err(|_| RenderError::Timeout(config.timeout))??;

    Ok(typography_from_styles(&styles))
}

/// Copy of `result` with computed typography, or an unchanged copy on failure
pub async fn refine(
    result: &AnalysisResult,
    renderer: &dyn Renderer,
    config: &RefineConfig,
) -> AnalysisResult {
    match try_refine(result, renderer, config).await {
        Ok(typography) => {
            tracing::debug!(
                renderer = renderer.name(),
                fonts = typography.fonts.len(),
                font_sizes = typography.font_sizes.len(),
                "Refined typography"
            );
            result.with_typography(typography)
        }
        Err(e) => {
            tracing::warn!(
                renderer = renderer.name(),
                error = %e,
                "Refinement failed, keeping declared typography"
            );
            result.clone()
        }
    }
}

/// Refinement running on a background task
///
/// The primary result is kept so that [`join`](RefinementTask::join) can
/// fall back to it if the task is aborted or panics.
pub struct RefinementTask {
    handle: JoinHandle<AnalysisResult>,
    fallback: AnalysisResult,
}

impl RefinementTask {
    /// Cancel the pass; the renderer's context is dropped with the task
    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the refined result
    pub async fn join(self) -> AnalysisResult {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!(error = %e, "Refinement task did not complete");
                self.fallback
            }
        }
    }
}

/// Start refining `result` on a tokio task
pub fn spawn_refinement(
    result: AnalysisResult,
    renderer: Arc<dyn Renderer>,
    config: RefineConfig,
) -> RefinementTask {
    let fallback = result.clone();
    let handle = tokio::spawn(async move { refine(&result, renderer.as_ref(), &config).await });
    RefinementTask { handle, fallback }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRenderer(Vec<ComputedStyle>);

    #[async_trait]
    impl Renderer for FixedRenderer {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn render(
            &self,
            _html: &str,
            _base_url: Option<&Url>,
            _settle: Duration,
        ) -> Result<Vec<ComputedStyle>, RenderError> {
            Ok(self.0.clone())
        }
    }

    struct FailingRenderer;

    #[async_trait]
    impl Renderer for FailingRenderer {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn render(
            &self,
            _html: &str,
            _base_url: Option<&Url>,
            _settle: Duration,
        ) -> Result<Vec<ComputedStyle>, RenderError> {
            Err(RenderError::Failed("boom".to_string()))
        }
    }

    struct StalledRenderer;

    #[async_trait]
    impl Renderer for StalledRenderer {
        fn name(&self) -> &'static str {
            "stalled"
        }

        async fn render(
            &self,
            _html: &str,
            _base_url: Option<&Url>,
            _settle: Duration,
        ) -> Result<Vec<ComputedStyle>, RenderError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }
    }

    /// Waits out the settle window, then reports one style
    struct SettlingRenderer;

    #[async_trait]
    impl Renderer for SettlingRenderer {
        fn name(&self) -> &'static str {
            "settling"
        }

        async fn render(
            &self,
            _html: &str,
            _base_url: Option<&Url>,
            settle: Duration,
        ) -> Result<Vec<ComputedStyle>, RenderError> {
            tokio::time::sleep(settle).await;
            Ok(vec![style("Settled", "20px")])
        }
    }

    struct PanickingRenderer;

    #[async_trait]
    impl Renderer for PanickingRenderer {
        fn name(&self) -> &'static str {
            "panicking"
        }

        async fn render(
            &self,
            _html: &str,
            _base_url: Option<&Url>,
            _settle: Duration,
        ) -> Result<Vec<ComputedStyle>, RenderError> {
            panic!("renderer crashed");
        }
    }

    fn style(family: &str, size: &str) -> ComputedStyle {
        ComputedStyle {
            font_family: Some(family.to_string()),
            font_size: Some(size.to_string()),
        }
    }

    fn primary() -> AnalysisResult {
        AnalysisResult {
            url: "https://x.test/".to_string(),
            colors: vec!["#000".to_string()],
            fonts: vec!["Declared".to_string()],
            font_sizes: vec!["1em".to_string()],
            css_urls: vec![],
            html: "<html></html>".to_string(),
            refined: None,
        }
    }

    fn quick() -> RefineConfig {
        RefineConfig {
            settle: Duration::ZERO,
            timeout: Duration::from_millis(100),
        }
    }

    #[test]
    fn test_typography_from_styles() {
        let typography = typography_from_styles(&[
            style("\"Inter\", sans-serif", "16px"),
            style("Inter, serif", "32px"),
            style("monospace", "13.3333px"),
            ComputedStyle::default(),
        ]);
        assert_eq!(typography.fonts, vec!["Inter"]);
        assert_eq!(typography.font_sizes, vec!["13.3333px", "16px", "32px"]);
    }

    #[tokio::test]
    async fn test_refine_replaces_typography() {
        let renderer = FixedRenderer(vec![style("Inter", "16px")]);
        let refined = refine(&primary(), &renderer, &quick()).await;
        assert_eq!(refined.fonts, vec!["Inter"]);
        assert_eq!(refined.font_sizes, vec!["16px"]);
        assert_eq!(refined.colors, primary().colors);
        assert_eq!(refined.refined, Some(true));
    }

    #[test]
    fn test_refine_config_timeout_outlasts_settle() {
        let config = RefineConfig::new(DEFAULT_SETTLE, None);
        assert_eq!(config.timeout, DEFAULT_REFINE_TIMEOUT);

        let config = RefineConfig::new(Duration::from_millis(5100), None);
        assert_eq!(config.timeout, Duration::from_millis(9100));

        let config = RefineConfig::new(Duration::from_secs(3), Some(Duration::from_secs(2)));
        assert_eq!(config.timeout, Duration::from_secs(7));

        let config = RefineConfig::new(Duration::from_secs(3), Some(Duration::from_secs(10)));
        assert_eq!(config.timeout, Duration::from_secs(10));

        let config = RefineConfig::new(Duration::ZERO, Some(Duration::from_millis(50)));
        assert_eq!(config.timeout, Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_settle_longer_than_requested_timeout_still_refines() {
        let config =
            RefineConfig::new(Duration::from_millis(300), Some(Duration::from_millis(100)));
        let refined = refine(&primary(), &SettlingRenderer, &config).await;
        assert_eq!(refined.refined, Some(true));
        assert_eq!(refined.fonts, vec!["Settled"]);
    }

    #[tokio::test]
    async fn test_refine_failure_keeps_declared() {
        let refined = refine(&primary(), &FailingRenderer, &quick()).await;
        assert_eq!(refined, primary());
    }

    #[tokio::test]
    async fn test_refine_timeout_keeps_declared() {
        let err = try_refine(&primary(), &StalledRenderer, &quick())
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Timeout(_)));
        let refined = refine(&primary(), &StalledRenderer, &quick()).await;
        assert_eq!(refined, primary());
    }

    #[tokio::test]
    async fn test_spawned_refinement_panic_falls_back() {
        let task = spawn_refinement(primary(), Arc::new(PanickingRenderer), quick());
        assert_eq!(task.join().await, primary());
    }

    #[tokio::test]
    async fn test_spawned_refinement_abort_falls_back() {
        let task = spawn_refinement(primary(), Arc::new(StalledRenderer), RefineConfig::default());
        task.abort();
        assert_eq!(task.join().await, primary());
    }

    #[tokio::test]
    async fn test_spawned_refinement_completes() {
        let task = spawn_refinement(
            primary(),
            Arc::new(FixedRenderer(vec![style("Lato", "12px")])),
            quick(),
        );
        let refined = task.join().await;
        assert_eq!(refined.fonts, vec!["Lato"]);
    }
}
