//! StyleKit - web page style fingerprinting
//!
//! This crate fetches a page and reports its visual fingerprint: a small
//! color palette, the font families and font sizes in use, and the
//! stylesheets it references.
//!
//! ## Pipeline
//!
//! The primary pass reads declared values only. [`analyze`] fetches the
//! page, parses it once and runs the extractors in [`extract`]. Colors come
//! from inline styles and from the dominant colors of page images (see
//! [`images`]).
//!
//! An optional [`refine`] pass renders the captured markup with a
//! [`Renderer`] and replaces the typography with computed values.
//! [`CascadeRenderer`] is the built-in renderer.

pub mod client;
pub mod css;
mod error;
pub mod extract;
mod http;
pub mod images;
pub mod refine;
mod tool;
mod types;

pub use client::{analyze, analyze_with_options, validate, AnalyzeOptions};
pub use error::{
    AnalyzeError, FetchError, ImageError, RenderError, UrlResolutionError, ValidationError,
};
pub use images::ImageLoader;
pub use refine::{
    spawn_refinement, CascadeRenderer, ComputedStyle, RefineConfig, RefinementTask, Renderer,
};
pub use tool::{AnalyzeStatus, Analyzer, AnalyzerBuilder};
pub use types::{AnalysisRequest, AnalysisResult, Typography};

/// Default User-Agent string
pub const DEFAULT_USER_AGENT: &str = "Everruns StyleKit/1.0";

/// Most colors reported for a page
pub const MAX_COLORS: usize = 10;

/// Dominant colors taken from each image
pub const IMAGE_PALETTE_SIZE: usize = 5;

/// Tool description for LLM consumption
pub const TOOL_DESCRIPTION: &str = r#"Analyzes the visual style of a web page.

- Extracts a palette of up to 10 colors from inline styles and images
- Lists font families and font sizes in use
- Lists referenced stylesheets as absolute URLs
- Optional refinement from computed styles"#;

/// Extended documentation for LLM consumption (llmtxt)
pub const TOOL_LLMTXT: &str = r#"# StyleKit Tool

Analyzes the visual style of a web page and returns its fingerprint.

## Capabilities
- Color palette from inline `color:` declarations (hex and rgb())
- Dominant colors of `<img>` sources
- Font families (generic families such as serif are dropped)
- Font sizes sorted by numeric value
- Stylesheet URLs from `<link rel="stylesheet">` and `@import`
- Optional typography refinement from computed styles

## Input Parameters
- `url` (required): The page to analyze (must be http:// or https://)

## Output Fields
- `url`: The analyzed URL, after redirects
- `colors`: Up to 10 unique color literals, inline styles first
- `fonts`: Font family names
- `fontSizes`: Unique font sizes, ascending
- `cssUrls`: Absolute stylesheet URLs
- `html`: Serialized page markup
- `refined`: True when typography came from computed styles

## Examples

### Analyze a page
```json
{"url": "https://example.com"}
```

## Error Handling
- Invalid or non-http URLs fail before any network access
- A failed page fetch fails the analysis
- Images and stylesheets that fail to load are skipped
- A failed refinement keeps the declared typography
"#;
