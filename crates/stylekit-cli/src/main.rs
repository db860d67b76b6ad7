//! StyleKit CLI - Command-line interface for page style analysis

use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, Write};
use std::time::Duration;
use stylekit::{AnalysisRequest, AnalysisResult, Analyzer, CascadeRenderer, TOOL_LLMTXT};
use tracing_subscriber::EnvFilter;

/// Output format for analyze subcommand
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    /// Markdown with YAML frontmatter
    #[default]
    Md,
    /// JSON format
    Json,
}

/// StyleKit - colors, fonts and stylesheets of a web page
#[derive(Parser, Debug)]
#[command(name = "stylekit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Print full help with examples (llmtxt)
    #[arg(long)]
    llmtxt: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a page and print its style fingerprint
    Analyze(AnalyzeArgs),
}

#[derive(clap::Args, Debug)]
struct AnalyzeArgs {
    /// URL to analyze
    url: String,

    /// Output format
    #[arg(long, short, default_value = "md")]
    output: OutputFormat,

    /// Custom User-Agent
    #[arg(long)]
    user_agent: Option<String>,

    /// Skip fetching images for their dominant colors
    #[arg(long)]
    no_images: bool,

    /// Recompute typography from rendered styles
    #[arg(long)]
    refine: bool,

    /// Settle window before computed styles are read, in milliseconds
    #[arg(long, default_value_t = 1000)]
    settle_ms: u64,

    /// Bound on the whole refinement, settle window included, in milliseconds
    #[arg(long)]
    refine_timeout_ms: Option<u64>,

    /// Do not load linked stylesheets while refining
    #[arg(long)]
    no_external_css: bool,

    /// Keep the page markup in JSON output
    #[arg(long)]
    include_html: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    // Handle --llmtxt flag
    if cli.llmtxt {
        writeln_safe(TOOL_LLMTXT);
        std::process::exit(0);
    }

    match cli.command {
        Some(Commands::Analyze(args)) => {
            run_analyze(args).await;
        }
        None => {
            eprintln!("Usage: stylekit analyze <URL>");
            eprintln!("   or: stylekit --help");
            std::process::exit(1);
        }
    }
}

async fn run_analyze(args: AnalyzeArgs) {
    let mut builder = Analyzer::builder()
        .extract_images(!args.no_images)
        .settle(Duration::from_millis(args.settle_ms));

    match refine_timeout(&args) {
        Ok(Some(timeout)) => builder = builder.refine_timeout(timeout),
        Ok(None) => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }

    if let Some(ua) = &args.user_agent {
        builder = builder.user_agent(ua.clone());
    }

    let analyzer = builder.build();

    let mut result = match analyzer.execute(AnalysisRequest::new(&args.url)).await {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if args.refine {
        let renderer = if args.no_external_css {
            CascadeRenderer::offline()
        } else {
            CascadeRenderer::new(args.user_agent.as_deref()).unwrap_or_else(|e| {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            })
        };
        tracing::debug!(
            url = %result.url,
            external_css = !args.no_external_css,
            "Refining typography"
        );
        result = analyzer.refine(&result, &renderer).await;
    }

    match args.output {
        OutputFormat::Md => writeln_safe(&format_md_with_frontmatter(&result)),
        OutputFormat::Json => {
            let json = format_json(&result, args.include_html).unwrap_or_else(|e| {
                eprintln!("Error serializing result: {}", e);
                std::process::exit(1);
            });
            writeln_safe(&json);
        }
    }
}

/// Explicit refinement timeout, rejected unless it outlasts the settle window
fn refine_timeout(args: &AnalyzeArgs) -> Result<Option<Duration>, String> {
    match args.refine_timeout_ms {
        Some(timeout_ms) if timeout_ms <= args.settle_ms => Err(format!(
            "--refine-timeout-ms ({}) must be greater than --settle-ms ({})",
            timeout_ms, args.settle_ms
        )),
        Some(timeout_ms) => Ok(Some(Duration::from_millis(timeout_ms))),
        None => Ok(None),
    }
}

/// Format result as pretty JSON, dropping the markup unless asked for
fn format_json(result: &AnalysisResult, include_html: bool) -> serde_json::Result<String> {
    let mut value = serde_json::to_value(result)?;
    if !include_html {
        if let Some(obj) = value.as_object_mut() {
            obj.remove("html");
        }
    }
    serde_json::to_string_pretty(&value)
}

/// Format result as markdown with YAML frontmatter
fn format_md_with_frontmatter(result: &AnalysisResult) -> String {
    let mut output = String::new();

    // Build frontmatter
    output.push_str("---\n");
    output.push_str(&format!("url: {}\n", result.url));
    output.push_str(&format!("colors: {}\n", result.colors.len()));
    output.push_str(&format!("fonts: {}\n", result.fonts.len()));
    output.push_str(&format!("font_sizes: {}\n", result.font_sizes.len()));
    output.push_str(&format!("css_urls: {}\n", result.css_urls.len()));
    if result.refined == Some(true) {
        output.push_str("refined: true\n");
    }
    output.push_str("---\n");

    push_section(&mut output, "Colors", &result.colors, "No colors detected");
    push_section(&mut output, "Fonts", &result.fonts, "No fonts detected");
    push_section(
        &mut output,
        "Font Sizes",
        &result.font_sizes,
        "No font sizes detected",
    );
    push_section(
        &mut output,
        "Stylesheets",
        &result.css_urls,
        "No stylesheets detected",
    );

    output.truncate(output.trim_end().len());
    output
}

fn push_section(output: &mut String, title: &str, items: &[String], empty: &str) {
    output.push_str(&format!("\n## {}\n\n", title));
    if items.is_empty() {
        output.push_str(empty);
        output.push('\n');
    }
    for item in items {
        output.push_str(&format!("- {}\n", item));
    }
}

/// Write to stdout, exit silently on broken pipe
fn writeln_safe(s: &str) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = writeln!(handle, "{}", s) {
        if e.kind() == io::ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        eprintln!("Error writing to stdout: {}", e);
        std::process::exit(1);
    }
}
