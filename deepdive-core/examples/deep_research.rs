//! Deep Research Demo
//!
//! Runs a full research loop against the built-in mock providers and writes
//! the synthesized report to report.md.
//!
//! Run with:
//!   cargo run -p deepdive-core --example deep_research
//!
//! Or with a custom topic:
//!   cargo run -p deepdive-core --example deep_research -- "Your topic here"

use deepdive_core::{
    MockModel, MockSearch, ReportAssembler, ResearchConfig, ResearchContext,
    ResearchOrchestrator, EVENT_RESEARCH_COMPLETE, EVENT_RESEARCH_LEARNING,
    EVENT_RESEARCH_PROGRESS, EVENT_RESEARCH_REPORT_CHUNK, EVENT_SEARCH_KEYWORD,
    EVENT_SOURCE_LOGGER,
};
use futures_util::StreamExt;
use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let topic = env::args()
        .nth(1)
        .unwrap_or_else(|| "What are the main benefits of the Rust programming language?".into());

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                   Deep Research Demo                         ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    println!("Topic: {}", topic);
    println!();

    // Mock providers keep the demo self-contained; swap in real
    // LanguageModel / SearchProvider implementations for live research.
    let context = ResearchContext::new(Arc::new(MockModel::new()), Arc::new(MockSearch::new()));

    let config = ResearchConfig {
        max_depth: 3,
        total_breadth: 4,
        queries_per_level: 3,
        stagger_delay: Duration::from_millis(200),
        ..Default::default()
    };
    let orchestrator = ResearchOrchestrator::new(config)?;

    let start = Instant::now();
    let stream = orchestrator.execute(context, topic);
    futures_util::pin_mut!(stream);

    let mut assembler = ReportAssembler::new();
    while let Some(event) = stream.next().await {
        match event.event_type.as_str() {
            EVENT_RESEARCH_PROGRESS => {
                println!("▸ {}", event.message);
            }
            EVENT_SEARCH_KEYWORD => {
                println!("🔍 {}", event.message);
                if let Some(queries) = event.data.as_array() {
                    for query in queries {
                        if let Some(q) = query.as_str() {
                            println!("   • {}", q);
                        }
                    }
                }
            }
            EVENT_SOURCE_LOGGER => {
                println!("🌐 {}", event.message);
            }
            EVENT_RESEARCH_LEARNING => {
                println!("💡 {}", event.message);
            }
            EVENT_RESEARCH_REPORT_CHUNK => {
                if let Some(chunk) = event.as_report_chunk() {
                    assembler.insert(chunk);
                }
            }
            EVENT_RESEARCH_COMPLETE => {
                println!();
                println!("✅ {}", event.message);
            }
            other => {
                println!("[{}] {}", other, event.message);
            }
        }
    }

    let report = assembler.text();
    println!();
    println!("──────────────────────────────────────────────────────────────");
    println!("{}", report);
    println!("──────────────────────────────────────────────────────────────");
    println!("Elapsed: {:.1}s", start.elapsed().as_secs_f64());

    std::fs::write("report.md", &report)?;
    println!("Report written to report.md");

    Ok(())
}
