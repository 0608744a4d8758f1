//! Tool hot-path benchmarks
//!
//! Measures the pure, non-I/O work done on every tool call: URL screening
//! before an image download, response formatting and config parsing.
//!
//! Run with: `cargo bench`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use glm_mcp::config::FileConfig;
use glm_mcp::glm::types::{
    ChatResponse, Choice, ResponseMessage, SearchReference, WebSearchResult,
};
use glm_mcp::glm::validate_image_url;
use glm_mcp::tools::thinking::format_thinking_output;
use glm_mcp::tools::web_search::format_with_sources;
use std::str::FromStr;

fn response(content: &str, reasoning: Option<&str>, references: usize) -> ChatResponse {
    ChatResponse {
        choices: vec![Choice {
            message: ResponseMessage {
                role: "assistant".to_string(),
                content: Some(content.to_string()),
                reasoning_content: reasoning.map(str::to_string),
                ..Default::default()
            },
            ..Default::default()
        }],
        web_search: Some(WebSearchResult {
            refer: (0..references)
                .map(|i| SearchReference {
                    title: format!("Result {}", i),
                    link: format!("https://news.example.com/articles/{}", i),
                    snippet: String::new(),
                })
                .collect(),
        }),
        ..Default::default()
    }
}

/// Benchmark the SSRF guard on accepted and rejected URLs
fn bench_url_guard(c: &mut Criterion) {
    let cases = vec![
        ("public_host", "https://aigc-files.bigmodel.cn/api/cogview/20250101_abc.png"),
        ("private_ipv4", "https://192.168.1.20/image.png"),
        ("mapped_ipv6", "https://[::ffff:127.0.0.1]/image.png"),
        ("plain_http", "http://example.com/image.png"),
    ];

    let mut group = c.benchmark_group("url_guard");

    for (name, url) in cases {
        group.bench_with_input(BenchmarkId::from_parameter(name), &url, |b, u| {
            b.iter(|| validate_image_url(u).is_ok());
        });
    }

    group.finish();
}

/// Benchmark source list rendering for web search answers
fn bench_format_with_sources(c: &mut Criterion) {
    let mut group = c.benchmark_group("format_with_sources");

    for references in [0usize, 5, 25] {
        let resp = response("The answer, with a few sentences of text.", None, references);
        group.bench_with_input(BenchmarkId::from_parameter(references), &resp, |b, r| {
            b.iter(|| format_with_sources(r));
        });
    }

    group.finish();
}

/// Benchmark reasoning block rendering
fn bench_format_thinking(c: &mut Criterion) {
    let reasoning = "Consider the constraints one at a time. ".repeat(50);
    let resp = response("Final answer.", Some(&reasoning), 0);

    c.bench_function("format_thinking_output", |b| {
        b.iter(|| format_thinking_output(&resp));
    });
}

/// Benchmark configuration parsing and validation
///
/// Called once at startup; included to catch accidental regressions.
fn bench_config_parsing(c: &mut Criterion) {
    let toml_str = r#"
[api]
coding = true
default_model = "glm-4.7"
image_model = "cogview-4-250304"
timeout_seconds = 120

[observability]
log_level = "info"
"#;

    c.bench_function("config_parsing", |b| {
        b.iter(|| FileConfig::from_str(toml_str).is_ok());
    });
}

criterion_group!(
    benches,
    bench_url_guard,
    bench_format_with_sources,
    bench_format_thinking,
    bench_config_parsing,
);
criterion_main!(benches);
