//! The research loop: query generation, parallel search fan-out, learning
//! accumulation, recursive deepening, and final synthesis.
//!
//! Deepening is an explicit loop over a next-query variable rather than
//! recursion: each level generates queries, runs them as one batch under a
//! concurrency cap, then either descends with a narrower breadth or stops.
//! A branch failure degrades that branch only; the run always reaches
//! synthesis with whatever was learned.

use crate::config::{FollowUpPolicy, ResearchConfig};
use crate::error::{ResearchError, SearchError};
use crate::event::{ProgressSink, ResearchEvent, RunTotals};
use crate::extract::process_serp_result;
use crate::model::LanguageModel;
use crate::progress::{ProgressTracker, ProgressUpdate};
use crate::queries::{generate_serp_queries, SerpQuery};
use crate::search::{SearchOptions, SearchProvider};
use crate::synthesize::{stream_report, write_final_answer, write_final_report};
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

/// Providers and cancellation for one run.
#[derive(Clone)]
pub struct ResearchContext {
    pub model: Arc<dyn LanguageModel>,
    pub search: Arc<dyn SearchProvider>,
    pub cancellation_token: CancellationToken,
}

impl ResearchContext {
    pub fn new(model: Arc<dyn LanguageModel>, search: Arc<dyn SearchProvider>) -> Self {
        Self {
            model,
            search,
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(
        model: Arc<dyn LanguageModel>,
        search: Arc<dyn SearchProvider>,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            model,
            search,
            cancellation_token,
        }
    }
}

/// Final result of a research run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchReport {
    /// False when a level could not produce search queries; the run still
    /// reaches synthesis with whatever was accumulated.
    pub success: bool,

    /// Distinct learnings in discovery order.
    pub learnings: Vec<String>,

    /// Learnings joined as a plain-text digest.
    pub analysis: String,

    pub completed_queries: u32,
    pub total_queries: u32,

    /// Deduplicated source URLs in discovery order.
    pub visited_urls: Vec<String>,

    /// Combined answer and long-form report markdown.
    pub report: String,

    /// Why the loop stopped.
    pub message: String,
}

/// One batch branch's contribution to loop control.
#[derive(Debug)]
struct BranchOutcome {
    index: usize,
    found_sources: bool,
    follow_up_questions: Vec<String>,
}

/// Drives a full research run against a [`ResearchContext`].
#[derive(Clone)]
pub struct ResearchOrchestrator {
    config: Arc<ResearchConfig>,
}

impl ResearchOrchestrator {
    /// Create an orchestrator, validating the configuration up front.
    pub fn new(config: ResearchConfig) -> Result<Self, ResearchError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    /// Run research on `topic`, pushing progress events into `sink` and
    /// returning the final report.
    ///
    /// Only cancellation errors out; provider failures degrade the branch
    /// they hit and the run carries on to synthesis.
    pub async fn run(
        &self,
        ctx: &ResearchContext,
        topic: &str,
        sink: &ProgressSink,
    ) -> Result<ResearchReport, ResearchError> {
        if ctx.cancellation_token.is_cancelled() {
            return Err(ResearchError::Cancelled);
        }

        let config = &self.config;
        let tracker = Arc::new(ProgressTracker::new(
            config.max_depth,
            config.total_breadth,
            sink.clone(),
        ));
        tracker.start(topic).await;
        log::info!("Starting research: {topic}");

        let visited: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let mut current_topic = topic.to_string();
        let mut depth = config.max_depth;
        let mut breadth = config.total_breadth;
        let mut success = true;
        let message;

        loop {
            if ctx.cancellation_token.is_cancelled() {
                return Err(ResearchError::Cancelled);
            }

            // Base case: an exhausted budget returns what was accumulated,
            // with no further provider calls.
            if depth == 0 || breadth == 0 {
                message = "Research depth limit reached".to_string();
                break;
            }

            tracker
                .update(
                    ProgressUpdate::new()
                        .depth(config.max_depth - depth)
                        .breadth(breadth),
                )
                .await;

            let queries = match generate_serp_queries(
                ctx.model.as_ref(),
                &config.prompts,
                &current_topic,
                &tracker.learnings(),
                config.queries_per_level,
            )
            .await
            {
                Ok(queries) if !queries.is_empty() => queries,
                Ok(_) => {
                    log::warn!("Query generation returned no queries");
                    success = false;
                    message = "Could not generate search queries".to_string();
                    break;
                }
                Err(e) => {
                    log::warn!("Query generation failed: {e}");
                    success = false;
                    message = "Could not generate search queries".to_string();
                    break;
                }
            };

            sink.emit(ResearchEvent::search_keywords(
                &queries.iter().map(|q| q.query.clone()).collect::<Vec<_>>(),
            ))
            .await;
            tracker
                .update(
                    ProgressUpdate::new()
                        .add_total_queries(queries.len() as u32)
                        .current_query(&queries[0].query),
                )
                .await;

            let outcomes = self
                .run_batch(ctx, &tracker, sink, &visited, queries, breadth)
                .await?;

            if !outcomes.iter().any(|o| o.found_sources) {
                message = "No valid search results found".to_string();
                break;
            }

            let deeper = depth > 1 && breadth > 1;
            let next_query = if deeper { self.select_next_query(&outcomes) } else { None };
            match next_query {
                Some(next) if deeper => {
                    depth -= 1;
                    breadth = breadth.div_ceil(2);
                    log::debug!("Descending to depth {depth}, breadth {breadth}");
                    current_topic = next;
                }
                _ => {
                    message = "Research depth limit reached".to_string();
                    break;
                }
            }
        }

        if ctx.cancellation_token.is_cancelled() {
            return Err(ResearchError::Cancelled);
        }

        let snapshot = tracker.snapshot();
        let learnings = snapshot.learnings.clone();
        let visited_urls = lock(&visited).clone();
        log::info!(
            "Research loop finished ({message}): {} learnings, {} sources",
            learnings.len(),
            visited_urls.len()
        );

        let answer =
            write_final_answer(ctx.model.as_ref(), config, topic, &learnings).await;
        let report =
            write_final_report(ctx.model.as_ref(), config, topic, &learnings, &visited_urls)
                .await;
        let combined = format!("{answer}\n\n{report}");

        stream_report(
            sink,
            config,
            &combined,
            RunTotals {
                learnings_count: learnings.len(),
                queries_completed: snapshot.completed_queries,
                total_queries: snapshot.total_queries,
            },
        )
        .await;

        Ok(ResearchReport {
            success,
            analysis: learnings.join("\n\n"),
            learnings,
            completed_queries: snapshot.completed_queries,
            total_queries: snapshot.total_queries,
            visited_urls,
            report: combined,
            message,
        })
    }

    /// Run research on `topic`, exposing progress as an event stream
    /// instead of a sink-plus-result pair. The final report arrives as
    /// `research-report-chunk` events.
    pub fn execute(
        &self,
        ctx: ResearchContext,
        topic: impl Into<String>,
    ) -> impl Stream<Item = ResearchEvent> + Send {
        let orchestrator = self.clone();
        let topic = topic.into();
        async_stream::stream! {
            let (sink, mut rx) = ProgressSink::channel(64);
            let handle = tokio::spawn(async move {
                orchestrator.run(&ctx, &topic, &sink).await
            });
            while let Some(event) = rx.recv().await {
                yield event;
            }
            match handle.await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => log::error!("Research run failed: {e}"),
                Err(e) => log::error!("Research task failed: {e}"),
            }
        }
    }

    /// Dispatch one level's queries as concurrent branches under the
    /// configured concurrency cap. Returns outcomes in completion order.
    async fn run_batch(
        &self,
        ctx: &ResearchContext,
        tracker: &Arc<ProgressTracker>,
        sink: &ProgressSink,
        visited: &Arc<Mutex<Vec<String>>>,
        queries: Vec<SerpQuery>,
        breadth: u32,
    ) -> Result<Vec<BranchOutcome>, ResearchError> {
        let semaphore = Arc::new(Semaphore::new(self.config.search_concurrency));
        let (tx, mut rx) = mpsc::channel(queries.len().max(1));
        let num_follow_ups = breadth.div_ceil(2) as usize;

        for (index, query) in queries.into_iter().enumerate() {
            let config = Arc::clone(&self.config);
            let model = Arc::clone(&ctx.model);
            let search = Arc::clone(&ctx.search);
            let token = ctx.cancellation_token.clone();
            let tracker = Arc::clone(tracker);
            let sink = sink.clone();
            let visited = Arc::clone(visited);
            let semaphore = Arc::clone(&semaphore);
            let tx = tx.clone();

            tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                if index > 0 && !config.stagger_delay.is_zero() {
                    tokio::time::sleep(config.stagger_delay).await;
                }
                let outcome = run_branch(
                    &config, &*model, &*search, &token, &tracker, &sink, &visited, index,
                    query, num_follow_ups,
                )
                .await;
                let _ = tx.send(outcome).await;
            });
        }
        drop(tx);

        let mut outcomes = Vec::new();
        loop {
            tokio::select! {
                biased;
                _ = ctx.cancellation_token.cancelled() => {
                    return Err(ResearchError::Cancelled);
                }
                received = rx.recv() => match received {
                    Some(outcome) => outcomes.push(outcome),
                    None => break,
                },
            }
        }
        Ok(outcomes)
    }

    /// Pick the follow-up question that seeds the next level: the first
    /// question of the first contributing branch, verbatim.
    fn select_next_query(&self, outcomes: &[BranchOutcome]) -> Option<String> {
        match self.config.follow_up_policy {
            FollowUpPolicy::FirstByBranchIndex => {
                let mut ordered: Vec<&BranchOutcome> = outcomes.iter().collect();
                ordered.sort_by_key(|o| o.index);
                ordered
                    .into_iter()
                    .find_map(|o| o.follow_up_questions.first().cloned())
            }
            FollowUpPolicy::FirstCompleted => outcomes
                .iter()
                .find_map(|o| o.follow_up_questions.first().cloned()),
        }
    }
}

/// Execute one branch: search, extract, record. Never fails; a provider
/// error leaves the branch with zero contribution.
#[allow(clippy::too_many_arguments)]
async fn run_branch(
    config: &ResearchConfig,
    model: &dyn LanguageModel,
    search: &dyn SearchProvider,
    token: &CancellationToken,
    tracker: &ProgressTracker,
    sink: &ProgressSink,
    visited: &Mutex<Vec<String>>,
    index: usize,
    query: SerpQuery,
    num_follow_ups: usize,
) -> BranchOutcome {
    tracker
        .update(ProgressUpdate::new().current_query(&query.query))
        .await;

    let options = SearchOptions {
        timeout: config.search_timeout,
        limit: config.max_results_per_query,
    };
    let searched = tokio::select! {
        biased;
        _ = token.cancelled() => Err(SearchError::Cancelled),
        result = tokio::time::timeout(config.search_timeout, search.search(&query.query, options)) => {
            match result {
                Ok(inner) => inner,
                Err(_) => Err(SearchError::Timeout(config.search_timeout.as_millis() as u64)),
            }
        }
    };

    let response = match searched {
        Ok(response) => response,
        Err(e) => {
            log::warn!("Search failed for '{}': {e}", query.query);
            tracker.update(ProgressUpdate::new().query_completed()).await;
            return BranchOutcome {
                index,
                found_sources: false,
                follow_up_questions: Vec::new(),
            };
        }
    };

    let urls = response.urls();
    if !urls.is_empty() {
        sink.emit(ResearchEvent::sources(&urls)).await;
        let mut visited = lock(visited);
        for url in &urls {
            if !visited.contains(url) {
                visited.push(url.clone());
            }
        }
    }

    let contents: Vec<String> = response.contents().iter().map(ToString::to_string).collect();
    let processed = process_serp_result(
        model,
        &config.prompts,
        &query.query,
        &contents,
        config.num_learnings,
        num_follow_ups,
        config.content_token_budget,
        config.extraction_retries,
    )
    .await;

    let source = urls.first().map(String::as_str);
    for learning in &processed.learnings {
        sink.emit(ResearchEvent::learning(learning, source)).await;
        if !config.learning_pacing.is_zero() {
            tokio::time::sleep(config.learning_pacing).await;
        }
    }

    tracker
        .update(
            ProgressUpdate::new()
                .query_completed()
                .learnings(processed.learnings.clone()),
        )
        .await;

    BranchOutcome {
        index,
        found_sources: !urls.is_empty(),
        follow_up_questions: processed.follow_up_questions,
    }
}

fn lock(visited: &Mutex<Vec<String>>) -> MutexGuard<'_, Vec<String>> {
    visited.lock().unwrap_or_else(|e| e.into_inner())
}
