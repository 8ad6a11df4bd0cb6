//! Integration tests for the full research loop against mock providers.

mod common;

use common::{context, fast_config, init_logging, numbered_queries, serp_query};
use deepdive_core::{
    MockModel, MockSearch, ProgressSink, ProgressStatus, ReportAssembler, ResearchError,
    ResearchOrchestrator, ResearchProgress, SearchResponse, EVENT_RESEARCH_COMPLETE,
    EVENT_RESEARCH_REPORT_CHUNK,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

async fn run_and_collect(
    orchestrator: &ResearchOrchestrator,
    ctx: &deepdive_core::ResearchContext,
    topic: &str,
) -> (
    Result<deepdive_core::ResearchReport, ResearchError>,
    Vec<deepdive_core::ResearchEvent>,
) {
    let (sink, mut rx) = ProgressSink::channel(1024);
    let result = orchestrator.run(ctx, topic, &sink).await;
    drop(sink);
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    (result, events)
}

#[tokio::test]
async fn test_single_level_run_produces_report() {
    init_logging();
    let model = MockModel::new()
        .with_serp_queries(numbered_queries(3))
        .with_report("# Findings".to_string())
        .with_answer("the answer".to_string());
    let search = MockSearch::new();
    let orchestrator = ResearchOrchestrator::new(fast_config(1, 1, 3)).unwrap();

    let (result, events) =
        run_and_collect(&orchestrator, &context(&model, &search), "test topic").await;
    let report = result.unwrap();

    assert!(report.success);
    assert_eq!(report.message, "Research depth limit reached");
    let started = events.first().expect("no events emitted");
    assert_eq!(started.progress_status(), Some(ProgressStatus::Started));
    assert_eq!(started.data["topic"], "test topic");
    assert_eq!(model.serp_call_count(), 1);
    assert_eq!(search.call_count(), 3);
    assert_eq!(report.total_queries, 3);
    assert_eq!(report.completed_queries, 3);
    assert!(report.report.starts_with("the answer\n\n# Findings"));
    assert!(!report.learnings.is_empty());
    assert_eq!(report.analysis, report.learnings.join("\n\n"));
}

#[tokio::test]
async fn test_zero_depth_returns_without_provider_calls() {
    init_logging();
    let model = MockModel::new();
    let search = MockSearch::new();
    let orchestrator = ResearchOrchestrator::new(fast_config(0, 7, 5)).unwrap();

    let (result, _events) =
        run_and_collect(&orchestrator, &context(&model, &search), "test topic").await;
    let report = result.unwrap();

    assert!(report.success);
    assert_eq!(model.serp_call_count(), 0);
    assert_eq!(search.call_count(), 0);
    assert!(report.learnings.is_empty());
    // Synthesis still runs on the empty learnings list.
    assert!(!report.report.is_empty());
}

#[tokio::test]
async fn test_two_level_run_descends_once() {
    init_logging();
    let model = MockModel::new()
        .with_serp_queries(numbered_queries(2))
        .with_serp_queries(vec![serp_query("deeper query", "deeper goal")]);
    let search = MockSearch::new();
    let orchestrator = ResearchOrchestrator::new(fast_config(2, 2, 2)).unwrap();

    let (result, events) =
        run_and_collect(&orchestrator, &context(&model, &search), "test topic").await;
    let report = result.unwrap();

    // Level two runs with depth 1 and breadth 1, which stops the loop.
    assert_eq!(model.serp_call_count(), 2);
    assert_eq!(report.message, "Research depth limit reached");
    assert_eq!(report.total_queries, 3);
    assert_eq!(report.completed_queries, 3);
    assert!(search.calls().contains(&"deeper query".to_string()));
    // One distinct synthetic URL per searched query, across both levels.
    assert_eq!(report.visited_urls.len(), 3);

    // Streamed chunks reassemble to exactly the returned report.
    let mut assembler = ReportAssembler::new();
    let mut complete = None;
    for event in &events {
        if let Some(chunk) = event.as_report_chunk() {
            assembler.insert(chunk);
        }
        if event.event_type == EVENT_RESEARCH_COMPLETE {
            complete = event.as_complete();
        }
    }
    assert_eq!(assembler.text(), report.report);
    let totals = complete.expect("missing research-complete event");
    assert_eq!(totals.total_queries, 3);
    assert_eq!(totals.queries_completed, 3);
    assert_eq!(totals.learnings_count, report.learnings.len());
}

#[tokio::test]
async fn test_progress_counters_are_monotonic() {
    init_logging();
    let model = MockModel::new()
        .with_serp_queries(numbered_queries(3))
        .with_serp_queries(numbered_queries(2));
    let search = MockSearch::new();
    let orchestrator = ResearchOrchestrator::new(fast_config(2, 2, 3)).unwrap();

    let (result, events) =
        run_and_collect(&orchestrator, &context(&model, &search), "test topic").await;
    result.unwrap();

    let snapshots: Vec<ResearchProgress> =
        events.iter().filter_map(|e| e.as_progress()).collect();
    assert!(snapshots.len() >= 2);
    for pair in snapshots.windows(2) {
        assert!(pair[1].completed_queries >= pair[0].completed_queries);
        assert!(pair[1].total_queries >= pair[0].total_queries);
        assert!(pair[1].current_depth >= pair[0].current_depth);
        assert!(pair[1].learnings.len() >= pair[0].learnings.len());
    }
    let last = snapshots.last().unwrap();
    assert_eq!(last.completed_queries, last.total_queries);
}

#[tokio::test]
async fn test_dispatch_respects_concurrency_cap() {
    init_logging();
    let model = MockModel::new().with_serp_queries(numbered_queries(5));
    let mut search = MockSearch::new();
    for i in 0..5 {
        search = search.with_hold(&format!("query {i}"), Duration::from_millis(50));
    }
    let orchestrator = ResearchOrchestrator::new(fast_config(1, 1, 5)).unwrap();

    let (result, _events) =
        run_and_collect(&orchestrator, &context(&model, &search), "test topic").await;
    result.unwrap();

    assert_eq!(search.call_count(), 5);
    assert!(
        search.max_in_flight() <= 2,
        "saw {} concurrent searches",
        search.max_in_flight()
    );
}

#[tokio::test]
async fn test_branch_failure_does_not_sink_the_run() {
    init_logging();
    let model = MockModel::new().with_serp_queries(numbered_queries(5));
    let search = MockSearch::new().with_failure("query 2");
    let orchestrator = ResearchOrchestrator::new(fast_config(1, 1, 5)).unwrap();

    let (result, _events) =
        run_and_collect(&orchestrator, &context(&model, &search), "test topic").await;
    let report = result.unwrap();

    assert!(report.success);
    // The failed branch counts as attempted but contributes nothing.
    assert_eq!(report.completed_queries, 5);
    assert_eq!(report.total_queries, 5);
    assert_eq!(report.visited_urls.len(), 4);
    assert!(report.visited_urls.iter().all(|url| !url.contains("query-2")));
    assert!(!report.learnings.is_empty());
}

#[tokio::test]
async fn test_empty_search_results_stop_the_loop() {
    init_logging();
    let model = MockModel::new().with_serp_queries(numbered_queries(2));
    let search = MockSearch::new()
        .with_response("query 0", SearchResponse::default())
        .with_response("query 1", SearchResponse::default());
    let orchestrator = ResearchOrchestrator::new(fast_config(3, 4, 2)).unwrap();

    let (result, _events) =
        run_and_collect(&orchestrator, &context(&model, &search), "test topic").await;
    let report = result.unwrap();

    assert!(report.success);
    assert_eq!(report.message, "No valid search results found");
    assert!(report.learnings.is_empty());
    assert!(report.visited_urls.is_empty());
    // Synthesis still runs and the report is still produced.
    assert!(!report.report.is_empty());
    assert_eq!(model.serp_call_count(), 1);
}

#[tokio::test]
async fn test_query_generation_failure_marks_run_unsuccessful() {
    init_logging();
    let model = MockModel::new().failing();
    let search = MockSearch::new();
    let orchestrator = ResearchOrchestrator::new(fast_config(2, 2, 3)).unwrap();

    let (result, _events) =
        run_and_collect(&orchestrator, &context(&model, &search), "test topic").await;
    let report = result.unwrap();

    assert!(!report.success);
    assert_eq!(report.message, "Could not generate search queries");
    assert_eq!(search.call_count(), 0);
}

#[tokio::test]
async fn test_pre_cancelled_token_stops_before_any_provider_call() {
    init_logging();
    let model = MockModel::new();
    let search = MockSearch::new();
    let token = CancellationToken::new();
    token.cancel();
    let ctx = deepdive_core::ResearchContext::with_cancellation(
        Arc::new(model.clone()),
        Arc::new(search.clone()),
        token,
    );
    let orchestrator = ResearchOrchestrator::new(fast_config(2, 2, 3)).unwrap();

    let (result, _events) = run_and_collect(&orchestrator, &ctx, "test topic").await;

    assert!(matches!(result, Err(ResearchError::Cancelled)));
    assert_eq!(model.call_count(), 0);
    assert_eq!(search.call_count(), 0);
}

#[tokio::test]
async fn test_next_level_topic_is_the_first_follow_up_question() {
    init_logging();
    // Branch 0 finishes last, so the fast branch consumes the first queued
    // extraction response. FirstByBranchIndex must still seed the next level
    // from branch 0, and with its first follow-up question verbatim.
    let model = MockModel::new()
        .with_serp_queries(numbered_queries(2))
        .with_serp_queries(vec![serp_query("level two", "level two goal")])
        .with_learnings(
            vec!["fast branch learning".to_string()],
            vec!["fast branch follow-up?".to_string()],
        )
        .with_learnings(
            vec!["slow branch learning".to_string()],
            vec![
                "slow branch follow-up?".to_string(),
                "slow branch second follow-up?".to_string(),
            ],
        );
    let search = MockSearch::new().with_hold("query 0", Duration::from_millis(100));
    let orchestrator = ResearchOrchestrator::new(fast_config(2, 2, 2)).unwrap();

    let (result, _events) =
        run_and_collect(&orchestrator, &context(&model, &search), "test topic").await;
    result.unwrap();

    let seed_prompt = model
        .prompts()
        .into_iter()
        .find(|p| p.contains("follow-up?</prompt>"))
        .expect("second level was never seeded");
    // The question itself is the new topic, unmodified and alone.
    assert!(seed_prompt.contains("<prompt>slow branch follow-up?</prompt>"));
    assert!(!seed_prompt.contains("second follow-up"));
    assert!(!seed_prompt.contains("fast branch follow-up"));
}

#[tokio::test]
async fn test_report_chunks_are_bounded_and_ordered() {
    init_logging();
    let long_report = "lorem ipsum dolor sit amet. ".repeat(200);
    let model = MockModel::new()
        .with_serp_queries(numbered_queries(2))
        .with_report(long_report);
    let search = MockSearch::new();
    let mut config = fast_config(1, 1, 2);
    config.report_chunk_size = 500;
    let orchestrator = ResearchOrchestrator::new(config).unwrap();

    let (result, events) =
        run_and_collect(&orchestrator, &context(&model, &search), "test topic").await;
    let report = result.unwrap();

    let chunks: Vec<_> = events
        .iter()
        .filter(|e| e.event_type == EVENT_RESEARCH_REPORT_CHUNK)
        .filter_map(|e| e.as_report_chunk())
        .collect();
    assert!(chunks.len() > 1);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.index, i);
        assert_eq!(chunk.total, chunks.len());
        assert!(chunk.chunk.chars().count() <= 500);
        assert_eq!(chunk.is_last, i + 1 == chunks.len());
    }
    let reassembled: String = chunks.into_iter().map(|c| c.chunk).collect();
    assert_eq!(reassembled, report.report);
}
