//! Streaming progress events and the sink they are delivered through.
//!
//! Events are soft-typed: a stable `event_type` tag, a human-readable
//! `message`, and a flexible JSON payload. Consumers match on the tag and
//! deserialize the payload with the typed accessors; unknown event types
//! should be logged and ignored.

use crate::progress::ResearchProgress;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Full progress snapshot, emitted at run start and after every tracker update.
pub const EVENT_RESEARCH_PROGRESS: &str = "research-progress";
/// Queries produced by one query-generation call.
pub const EVENT_SEARCH_KEYWORD: &str = "search-keyword";
/// URLs discovered by one successful search call.
pub const EVENT_SOURCE_LOGGER: &str = "source-logger";
/// One new learning, emitted individually.
pub const EVENT_RESEARCH_LEARNING: &str = "research-learning";
/// One fixed-size chunk of the final combined report text.
pub const EVENT_RESEARCH_REPORT_CHUNK: &str = "research-report-chunk";
/// Terminal event summarizing run totals, emitted once after all chunks.
pub const EVENT_RESEARCH_COMPLETE: &str = "research-complete";

/// Lifecycle tag carried on `research-progress` snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressStatus {
    #[serde(rename = "started")]
    Started,
    #[serde(rename = "in-progress")]
    InProgress,
}

/// A single progress event pushed to the sink during a research run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchEvent {
    /// Stable event tag, one of the `EVENT_*` constants.
    pub event_type: String,

    /// Human-readable status line suitable for logs or a terminal.
    pub message: String,

    /// Event payload; shape depends on `event_type`.
    pub data: serde_json::Value,
}

/// Payload of a `research-report-chunk` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportChunk {
    pub chunk: String,
    pub index: usize,
    pub total: usize,
    pub is_last: bool,
}

/// Payload of the terminal `research-complete` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTotals {
    pub learnings_count: usize,
    pub queries_completed: u32,
    pub total_queries: u32,
}

impl ResearchEvent {
    /// Create an event with an arbitrary type and payload.
    pub fn custom(
        event_type: impl Into<String>,
        message: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            message: message.into(),
            data,
        }
    }

    /// Full progress snapshot tagged with its lifecycle status.
    pub fn progress(snapshot: &ResearchProgress, status: ProgressStatus) -> Self {
        let message = format!(
            "Depth {}/{}, Breadth {}/{}, Queries {}/{}",
            snapshot.current_depth,
            snapshot.total_depth,
            snapshot.current_breadth,
            snapshot.total_breadth,
            snapshot.completed_queries,
            snapshot.total_queries,
        );
        let mut data = serde_json::to_value(snapshot).unwrap_or_default();
        if let Some(map) = data.as_object_mut() {
            map.insert(
                "status".to_string(),
                serde_json::to_value(status).unwrap_or_default(),
            );
        }
        Self::custom(EVENT_RESEARCH_PROGRESS, message, data)
    }

    /// The run-start snapshot, tagged `started` and carrying the topic.
    pub fn progress_started(snapshot: &ResearchProgress, topic: &str) -> Self {
        let mut event = Self::progress(snapshot, ProgressStatus::Started);
        if let Some(map) = event.data.as_object_mut() {
            map.insert("topic".to_string(), serde_json::json!(topic));
        }
        event
    }

    /// Queries generated for one level, as a plain string array.
    pub fn search_keywords(queries: &[String]) -> Self {
        Self::custom(
            EVENT_SEARCH_KEYWORD,
            format!("Generated {} search queries", queries.len()),
            serde_json::json!(queries),
        )
    }

    /// URLs discovered by one successful search, as a plain string array.
    pub fn sources(urls: &[String]) -> Self {
        Self::custom(
            EVENT_SOURCE_LOGGER,
            format!("Found {} sources", urls.len()),
            serde_json::json!(urls),
        )
    }

    /// One new learning with its source URL and discovery timestamp.
    pub fn learning(learning: &str, source: Option<&str>) -> Self {
        Self::custom(
            EVENT_RESEARCH_LEARNING,
            learning.to_string(),
            serde_json::json!({
                "learning": learning,
                "source": source,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }),
        )
    }

    /// One chunk of the final combined report text.
    pub fn report_chunk(chunk: &ReportChunk) -> Self {
        Self::custom(
            EVENT_RESEARCH_REPORT_CHUNK,
            format!("Report chunk {}/{}", chunk.index + 1, chunk.total),
            serde_json::to_value(chunk).unwrap_or_default(),
        )
    }

    /// Terminal completion event with run totals.
    pub fn complete(totals: &RunTotals) -> Self {
        Self::custom(
            EVENT_RESEARCH_COMPLETE,
            format!(
                "Research complete: {} learnings from {}/{} queries",
                totals.learnings_count, totals.queries_completed, totals.total_queries
            ),
            serde_json::to_value(totals).unwrap_or_default(),
        )
    }

    /// Parse a `research-progress` payload, `None` for other event types.
    pub fn as_progress(&self) -> Option<ResearchProgress> {
        if self.event_type == EVENT_RESEARCH_PROGRESS {
            serde_json::from_value(self.data.clone()).ok()
        } else {
            None
        }
    }

    /// Status tag of a `research-progress` event, `None` for other types.
    pub fn progress_status(&self) -> Option<ProgressStatus> {
        if self.event_type == EVENT_RESEARCH_PROGRESS {
            self.data
                .get("status")
                .and_then(|v| serde_json::from_value(v.clone()).ok())
        } else {
            None
        }
    }

    /// Parse a `research-report-chunk` payload, `None` for other event types.
    pub fn as_report_chunk(&self) -> Option<ReportChunk> {
        if self.event_type == EVENT_RESEARCH_REPORT_CHUNK {
            serde_json::from_value(self.data.clone()).ok()
        } else {
            None
        }
    }

    /// Parse a `research-complete` payload, `None` for other event types.
    pub fn as_complete(&self) -> Option<RunTotals> {
        if self.event_type == EVENT_RESEARCH_COMPLETE {
            serde_json::from_value(self.data.clone()).ok()
        } else {
            None
        }
    }
}

/// Append-only channel the run pushes events into.
///
/// Cloneable so concurrent branches can emit without coordination; delivery
/// is serialized by the underlying channel. A dropped receiver never aborts
/// the run: the consumer abandoning the stream is the one supported way to
/// stop listening, and the core keeps working toward its result.
#[derive(Clone)]
pub struct ProgressSink {
    tx: mpsc::Sender<ResearchEvent>,
}

impl ProgressSink {
    /// Create a sink and the receiving half the consumer drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ResearchEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Deliver one event. If the consumer is gone the event is dropped.
    pub async fn emit(&self, event: ResearchEvent) {
        if self.tx.send(event).await.is_err() {
            log::debug!("Progress receiver dropped, event discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_chunk_round_trips_camel_case() {
        let chunk = ReportChunk {
            chunk: "abc".to_string(),
            index: 2,
            total: 3,
            is_last: true,
        };
        let event = ResearchEvent::report_chunk(&chunk);
        assert_eq!(event.event_type, EVENT_RESEARCH_REPORT_CHUNK);
        assert_eq!(event.data["isLast"], serde_json::json!(true));
        assert_eq!(event.as_report_chunk().unwrap(), chunk);
    }

    #[test]
    fn test_accessors_reject_other_event_types() {
        let event = ResearchEvent::custom("other", "msg", serde_json::json!({}));
        assert!(event.as_progress().is_none());
        assert!(event.as_report_chunk().is_none());
        assert!(event.as_complete().is_none());
    }

    #[test]
    fn test_progress_event_carries_status() {
        let snapshot = ResearchProgress::new(15, 7);
        let event = ResearchEvent::progress(&snapshot, ProgressStatus::Started);
        assert_eq!(event.data["status"], serde_json::json!("started"));
        assert_eq!(event.progress_status(), Some(ProgressStatus::Started));

        let parsed = event.as_progress().unwrap();
        assert_eq!(parsed.total_depth, 15);
        assert_eq!(parsed.total_breadth, 7);
    }

    #[test]
    fn test_learning_event_payload() {
        let event = ResearchEvent::learning("Rust is fast", Some("https://example.com"));
        assert_eq!(event.event_type, EVENT_RESEARCH_LEARNING);
        assert_eq!(event.data["learning"], "Rust is fast");
        assert_eq!(event.data["source"], "https://example.com");
        assert!(event.data["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_sink_survives_dropped_receiver() {
        let (sink, rx) = ProgressSink::channel(4);
        drop(rx);
        // Must not panic or error
        sink.emit(ResearchEvent::custom("x", "y", serde_json::json!({})))
            .await;
    }
}
