//! Example: Analyze various pages and display their style fingerprint
//!
//! Run with: cargo run -p stylekit --example analyze_urls
//!
//! Set `RUST_LOG=stylekit=debug` to watch skipped images and stylesheets.

use stylekit::{analyze, AnalysisRequest, AnalysisResult, Analyzer, CascadeRenderer};
use tracing_subscriber::EnvFilter;

/// Test case definition
struct TestCase {
    url: &'static str,
    description: &'static str,
    expect_css: bool,
    refine: bool,
}

/// Define test cases here
const TEST_CASES: &[TestCase] = &[
    TestCase {
        url: "https://example.com",
        description: "Minimal page with an embedded stylesheet",
        expect_css: false,
        refine: false,
    },
    TestCase {
        url: "https://httpbin.org/html",
        description: "Unstyled HTML",
        expect_css: false,
        refine: false,
    },
    TestCase {
        url: "https://www.rust-lang.org",
        description: "Site with linked stylesheets, refined",
        expect_css: true,
        refine: true,
    },
];

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("StyleKit URL Examples");
    println!("=====================\n");

    let mut passed = 0;
    let mut failed = 0;

    for (i, case) in TEST_CASES.iter().enumerate() {
        println!("{}. {}", i + 1, case.description);
        println!("   URL: {}", case.url);

        match analyze(AnalysisRequest::new(case.url)).await {
            Ok(result) => {
                let result = if case.refine {
                    refine(&result).await
                } else {
                    result
                };
                print_result_summary(&result);

                if check_expectations(case, &result) {
                    println!("   ✓ PASS\n");
                    passed += 1;
                } else {
                    println!("   ✗ FAIL (expectations not met)\n");
                    failed += 1;
                }
            }
            Err(e) => {
                println!("   Error: {}", e);
                println!("   ✗ FAIL\n");
                failed += 1;
            }
        }
    }

    println!("=====================");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed > 0 {
        std::process::exit(1);
    }
}

async fn refine(result: &AnalysisResult) -> AnalysisResult {
    match CascadeRenderer::new(None) {
        Ok(renderer) => Analyzer::default().refine(result, &renderer).await,
        Err(e) => {
            println!("   Renderer unavailable: {}", e);
            result.clone()
        }
    }
}

fn print_result_summary(result: &AnalysisResult) {
    println!("   Colors: {}", result.colors.join(", "));
    println!("   Fonts: {}", result.fonts.join(", "));
    println!("   Font sizes: {}", result.font_sizes.join(", "));
    println!("   Stylesheets: {}", result.css_urls.len());
    if result.refined == Some(true) {
        println!("   Refined: yes");
    }
}

fn check_expectations(case: &TestCase, result: &AnalysisResult) -> bool {
    if result.colors.len() > stylekit::MAX_COLORS {
        println!("   Expected at most {} colors", stylekit::MAX_COLORS);
        return false;
    }

    if case.expect_css && result.css_urls.is_empty() {
        println!("   Expected stylesheet URLs");
        return false;
    }

    if case.refine && result.refined != Some(true) {
        println!("   Expected refined typography");
        return false;
    }

    true
}
