//! Final report and answer synthesis, plus chunked streaming of the result.

use crate::config::ResearchConfig;
use crate::event::{ProgressSink, ReportChunk, ResearchEvent, RunTotals};
use crate::model::{LanguageModel, ModelRequest};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;

#[derive(Deserialize)]
struct ReportPayload {
    #[serde(rename = "reportMarkdown")]
    report_markdown: String,
}

#[derive(Deserialize)]
struct AnswerPayload {
    #[serde(rename = "exactAnswer")]
    exact_answer: String,
}

/// Write the long-form final report from accumulated learnings, with a
/// sources section appended from the visited URLs.
///
/// Degrades to a learnings digest if the model call fails; synthesis never
/// errors a run that produced learnings.
pub async fn write_final_report(
    model: &dyn LanguageModel,
    config: &ResearchConfig,
    topic: &str,
    learnings: &[String],
    visited_urls: &[String],
) -> String {
    let prompt = config.prompts.render_report(topic, learnings);
    let request = ModelRequest::with_system(prompt, &config.prompts.system)
        .with_schema(json!({
            "type": "object",
            "properties": {
                "reportMarkdown": {
                    "type": "string",
                    "description": "Final report on the topic in Markdown"
                }
            },
            "required": ["reportMarkdown"]
        }));

    let report = match model.generate_object(request).await {
        Ok(value) => match serde_json::from_value::<ReportPayload>(value) {
            Ok(payload) => payload.report_markdown,
            Err(e) => {
                log::warn!("Malformed report payload: {e}, falling back to digest");
                learnings_digest(topic, learnings)
            }
        },
        Err(e) => {
            log::warn!("Report generation failed: {e}, falling back to digest");
            learnings_digest(topic, learnings)
        }
    };

    if visited_urls.is_empty() {
        report
    } else {
        let sources = visited_urls
            .iter()
            .map(|url| format!("- {url}"))
            .collect::<Vec<_>>()
            .join("\n");
        format!("{report}\n\n## Sources\n\n{sources}")
    }
}

fn learnings_digest(topic: &str, learnings: &[String]) -> String {
    let body = learnings
        .iter()
        .map(|learning| format!("- {learning}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("# {topic}\n\n{body}")
}

/// Write the short final answer from accumulated learnings.
pub async fn write_final_answer(
    model: &dyn LanguageModel,
    config: &ResearchConfig,
    topic: &str,
    learnings: &[String],
) -> String {
    let prompt = config.prompts.render_answer(topic, learnings);
    let request = ModelRequest::with_system(prompt, &config.prompts.system)
        .with_schema(json!({
            "type": "object",
            "properties": {
                "exactAnswer": {
                    "type": "string",
                    "description": "The final answer, short and concise"
                }
            },
            "required": ["exactAnswer"]
        }));

    match model.generate_object(request).await {
        Ok(value) => match serde_json::from_value::<AnswerPayload>(value) {
            Ok(payload) => payload.exact_answer,
            Err(e) => {
                log::warn!("Malformed answer payload: {e}, falling back");
                learnings.first().cloned().unwrap_or_else(|| topic.to_string())
            }
        },
        Err(e) => {
            log::warn!("Answer generation failed: {e}, falling back");
            learnings.first().cloned().unwrap_or_else(|| topic.to_string())
        }
    }
}

/// Stream `text` to the sink as fixed-size `research-report-chunk` events
/// followed by a `research-complete` event.
///
/// Chunks split on character boundaries; concatenating every chunk in index
/// order reproduces `text` exactly.
pub async fn stream_report(sink: &ProgressSink, config: &ResearchConfig, text: &str, totals: RunTotals) {
    let chunks = split_chunks(text, config.report_chunk_size);
    let total = chunks.len();
    for (index, chunk) in chunks.into_iter().enumerate() {
        if index > 0 && !config.chunk_pacing.is_zero() {
            tokio::time::sleep(config.chunk_pacing).await;
        }
        sink.emit(ResearchEvent::report_chunk(&ReportChunk {
            chunk,
            index,
            total,
            is_last: index + 1 == total,
        }))
        .await;
    }
    sink.emit(ResearchEvent::complete(&totals)).await;
}

fn split_chunks(text: &str, chunk_size: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0usize;
    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == chunk_size {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Reassembles streamed report chunks, tolerating out-of-order arrival.
#[derive(Debug, Default)]
pub struct ReportAssembler {
    chunks: BTreeMap<usize, String>,
}

impl ReportAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, chunk: ReportChunk) {
        self.chunks.insert(chunk.index, chunk.chunk);
    }

    /// The report text seen so far, in index order.
    pub fn text(&self) -> String {
        self.chunks.values().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EVENT_RESEARCH_COMPLETE, EVENT_RESEARCH_REPORT_CHUNK};
    use crate::mock::MockModel;
    use rstest::rstest;

    #[rstest]
    #[case("", 1000, 0)]
    #[case("short", 1000, 1)]
    #[case(&"x".repeat(1000), 1000, 1)]
    #[case(&"x".repeat(1001), 1000, 2)]
    #[case(&"x".repeat(2500), 1000, 3)]
    fn test_chunk_counts(#[case] text: &str, #[case] size: usize, #[case] expected: usize) {
        assert_eq!(split_chunks(text, size).len(), expected);
    }

    #[test]
    fn test_chunks_concatenate_to_input() {
        let text = "étude ".repeat(400);
        let chunks = split_chunks(&text, 1000);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_chunks_split_on_char_boundaries() {
        let text = "😀".repeat(1500);
        for chunk in split_chunks(&text, 1000) {
            assert!(chunk.chars().count() <= 1000);
        }
    }

    #[tokio::test]
    async fn test_report_appends_sources() {
        let model = MockModel::new().with_report("# Findings".to_string());
        let config = ResearchConfig::default();

        let report = write_final_report(
            &model,
            &config,
            "topic",
            &["fact".to_string()],
            &["https://example.com/a".to_string()],
        )
        .await;

        assert!(report.starts_with("# Findings"));
        assert!(report.contains("## Sources"));
        assert!(report.contains("https://example.com/a"));
    }

    #[tokio::test]
    async fn test_report_degrades_on_model_failure() {
        let model = MockModel::new().failing();
        let config = ResearchConfig::default();

        let report =
            write_final_report(&model, &config, "topic", &["fact one".to_string()], &[]).await;

        assert!(report.contains("fact one"));
    }

    #[tokio::test]
    async fn test_answer_extraction() {
        let model = MockModel::new().with_answer("42".to_string());
        let config = ResearchConfig::default();

        let answer = write_final_answer(&model, &config, "meaning of life", &[]).await;
        assert_eq!(answer, "42");
    }

    #[tokio::test]
    async fn test_stream_report_round_trip() {
        let mut config = ResearchConfig::default();
        config.report_chunk_size = 10;
        config.chunk_pacing = std::time::Duration::ZERO;
        let (sink, mut rx) = ProgressSink::channel(64);
        let text = "abcdefghij".repeat(3);

        stream_report(
            &sink,
            &config,
            &text,
            RunTotals {
                learnings_count: 1,
                queries_completed: 1,
                total_queries: 1,
            },
        )
        .await;
        drop(sink);

        let mut assembler = ReportAssembler::new();
        let mut saw_complete = false;
        let mut saw_last = false;
        while let Some(event) = rx.recv().await {
            match event.event_type.as_str() {
                EVENT_RESEARCH_REPORT_CHUNK => {
                    let chunk = event.as_report_chunk().unwrap();
                    saw_last |= chunk.is_last;
                    assembler.insert(chunk);
                }
                EVENT_RESEARCH_COMPLETE => saw_complete = true,
                other => panic!("unexpected event {other}"),
            }
        }

        assert_eq!(assembler.text(), text);
        assert!(saw_last);
        assert!(saw_complete);
    }
}
