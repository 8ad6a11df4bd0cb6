//! Mock providers for tests and examples.
//!
//! [`MockModel`] dispatches on the request schema's property names, so one
//! instance serves every model call of a run: query generation, learning
//! extraction, report and answer synthesis. [`MockSearch`] keys canned
//! responses by query string and instruments concurrency, which is what the
//! dispatch-cap tests lean on.

use crate::error::{ModelError, SearchError};
use crate::model::{LanguageModel, ModelRequest};
use crate::queries::SerpQuery;
use crate::search::{SearchOptions, SearchProvider, SearchResponse, SearchResultItem};
use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct MockModelInner {
    failing: Mutex<bool>,
    serp_queue: Mutex<VecDeque<Vec<SerpQuery>>>,
    learnings_queue: Mutex<VecDeque<(Vec<String>, Vec<String>)>>,
    report: Mutex<Option<String>>,
    answer: Mutex<Option<String>>,
    requests: Mutex<Vec<ModelRequest>>,
    serp_calls: AtomicUsize,
}

/// Deterministic [`LanguageModel`] returning canned structured payloads.
///
/// Clones share state, so a clone kept by the test observes calls made
/// through the clone handed to the run. Queued responses are consumed in
/// order; an empty queue falls back to a stable default payload.
#[derive(Clone, Default)]
pub struct MockModel {
    inner: Arc<MockModelInner>,
}

impl MockModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call with a provider error.
    pub fn failing(self) -> Self {
        *lock(&self.inner.failing) = true;
        self
    }

    /// Queue one query-generation response.
    pub fn with_serp_queries(self, queries: Vec<SerpQuery>) -> Self {
        lock(&self.inner.serp_queue).push_back(queries);
        self
    }

    /// Queue one learning-extraction response.
    pub fn with_learnings(self, learnings: Vec<String>, follow_ups: Vec<String>) -> Self {
        lock(&self.inner.learnings_queue).push_back((learnings, follow_ups));
        self
    }

    /// Set the report returned by report synthesis.
    pub fn with_report(self, report: String) -> Self {
        *lock(&self.inner.report) = Some(report);
        self
    }

    /// Set the answer returned by answer synthesis.
    pub fn with_answer(self, answer: String) -> Self {
        *lock(&self.inner.answer) = Some(answer);
        self
    }

    /// Total calls observed, across all schema kinds.
    pub fn call_count(&self) -> usize {
        lock(&self.inner.requests).len()
    }

    /// Query-generation calls observed.
    pub fn serp_call_count(&self) -> usize {
        self.inner.serp_calls.load(Ordering::SeqCst)
    }

    /// Prompts of every call observed, in arrival order.
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.inner.requests)
            .iter()
            .map(|request| request.prompt.clone())
            .collect()
    }

    /// Prompt of the most recent call.
    pub fn last_prompt(&self) -> Option<String> {
        lock(&self.inner.requests)
            .last()
            .map(|request| request.prompt.clone())
    }

    /// Retry budget of the most recent call.
    pub fn last_max_retries(&self) -> Option<u32> {
        lock(&self.inner.requests)
            .last()
            .map(|request| request.max_retries)
    }

    fn serp_payload(&self) -> serde_json::Value {
        self.inner.serp_calls.fetch_add(1, Ordering::SeqCst);
        let queries = lock(&self.inner.serp_queue).pop_front().unwrap_or_else(|| {
            vec![SerpQuery {
                query: "mock query".to_string(),
                research_goal: "mock goal".to_string(),
            }]
        });
        json!({ "queries": queries })
    }

    fn learnings_payload(&self) -> serde_json::Value {
        let (learnings, follow_ups) = lock(&self.inner.learnings_queue)
            .pop_front()
            .unwrap_or_else(|| {
                (
                    vec!["mock learning".to_string()],
                    vec!["mock follow-up?".to_string()],
                )
            });
        json!({ "learnings": learnings, "followUpQuestions": follow_ups })
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn generate_object(
        &self,
        request: ModelRequest,
    ) -> Result<serde_json::Value, ModelError> {
        let properties: Vec<String> = request
            .schema
            .as_ref()
            .and_then(|schema| schema.get("properties"))
            .and_then(|p| p.as_object())
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default();
        lock(&self.inner.requests).push(request);

        if *lock(&self.inner.failing) {
            return Err(ModelError::Other("mock model failure".to_string()));
        }

        if properties.iter().any(|key| key == "queries") {
            Ok(self.serp_payload())
        } else if properties.iter().any(|key| key == "learnings") {
            Ok(self.learnings_payload())
        } else if properties.iter().any(|key| key == "reportMarkdown") {
            let report = lock(&self.inner.report)
                .clone()
                .unwrap_or_else(|| "# Mock Report\n\nMock findings.".to_string());
            Ok(json!({ "reportMarkdown": report }))
        } else if properties.iter().any(|key| key == "exactAnswer") {
            let answer = lock(&self.inner.answer)
                .clone()
                .unwrap_or_else(|| "mock answer".to_string());
            Ok(json!({ "exactAnswer": answer }))
        } else {
            Err(ModelError::InvalidRequest(
                "mock model requires a known schema".to_string(),
            ))
        }
    }
}

#[derive(Default)]
struct MockSearchInner {
    responses: Mutex<HashMap<String, SearchResponse>>,
    failures: Mutex<HashSet<String>>,
    holds: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Canned [`SearchProvider`] keyed by query string.
///
/// Unknown queries get a synthetic single-result response so runs never
/// stall on missing fixtures. Tracks the high-water mark of concurrent
/// in-flight calls.
#[derive(Clone, Default)]
pub struct MockSearch {
    inner: Arc<MockSearchInner>,
}

impl MockSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the response returned for `query`.
    pub fn with_response(self, query: &str, response: SearchResponse) -> Self {
        lock(&self.inner.responses).insert(query.to_string(), response);
        self
    }

    /// Fail `query` with a transport error.
    pub fn with_failure(self, query: &str) -> Self {
        lock(&self.inner.failures).insert(query.to_string());
        self
    }

    /// Hold `query`'s response for `duration` before returning.
    pub fn with_hold(self, query: &str, duration: Duration) -> Self {
        lock(&self.inner.holds).insert(query.to_string(), duration);
        self
    }

    /// Queries received, in arrival order.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.inner.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.inner.calls).len()
    }

    /// Highest number of simultaneously in-flight calls observed.
    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    fn synthetic_response(query: &str) -> SearchResponse {
        let slug: String = query
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '-' })
            .collect();
        SearchResponse {
            data: vec![SearchResultItem {
                url: format!("https://example.com/{slug}"),
                markdown: Some(format!("Mock page content about {query}.")),
            }],
        }
    }
}

#[async_trait]
impl SearchProvider for MockSearch {
    async fn search(
        &self,
        query: &str,
        _options: SearchOptions,
    ) -> Result<SearchResponse, SearchError> {
        lock(&self.inner.calls).push(query.to_string());

        let current = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let hold = lock(&self.inner.holds).get(query).copied();
        if let Some(duration) = hold {
            tokio::time::sleep(duration).await;
        }

        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);

        if lock(&self.inner.failures).contains(query) {
            return Err(SearchError::Transport(format!(
                "mock transport failure for '{query}'"
            )));
        }

        let canned = lock(&self.inner.responses).get(query).cloned();
        Ok(canned.unwrap_or_else(|| Self::synthetic_response(query)))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_model_dispatches_on_schema() {
        let model = MockModel::new()
            .with_report("report body".to_string())
            .with_answer("short answer".to_string());

        let report = model
            .generate_object(
                ModelRequest::new("p")
                    .with_schema(json!({"properties": {"reportMarkdown": {}}})),
            )
            .await
            .unwrap();
        assert_eq!(report["reportMarkdown"], "report body");

        let answer = model
            .generate_object(
                ModelRequest::new("p").with_schema(json!({"properties": {"exactAnswer": {}}})),
            )
            .await
            .unwrap();
        assert_eq!(answer["exactAnswer"], "short answer");
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn test_model_queues_consume_in_order() {
        let model = MockModel::new()
            .with_learnings(vec!["first".to_string()], vec![])
            .with_learnings(vec!["second".to_string()], vec![]);
        let request =
            || ModelRequest::new("p").with_schema(json!({"properties": {"learnings": {}}}));

        let a = model.generate_object(request()).await.unwrap();
        let b = model.generate_object(request()).await.unwrap();
        let c = model.generate_object(request()).await.unwrap();

        assert_eq!(a["learnings"][0], "first");
        assert_eq!(b["learnings"][0], "second");
        assert_eq!(c["learnings"][0], "mock learning");
    }

    #[tokio::test]
    async fn test_model_rejects_unknown_schema() {
        let model = MockModel::new();
        let err = model
            .generate_object(ModelRequest::new("p"))
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_search_synthetic_response() {
        let search = MockSearch::new();
        let options = SearchOptions {
            timeout: Duration::from_secs(10),
            limit: 2,
        };

        let response = search.search("rust async", options).await.unwrap();
        assert_eq!(response.data.len(), 1);
        assert!(response.data[0].url.contains("rust-async"));
        assert_eq!(search.calls(), vec!["rust async"]);
    }

    #[tokio::test]
    async fn test_search_failure_is_keyed_by_query() {
        let search = MockSearch::new().with_failure("bad query");
        let options = SearchOptions {
            timeout: Duration::from_secs(10),
            limit: 2,
        };

        assert!(search.search("bad query", options.clone()).await.is_err());
        assert!(search.search("good query", options).await.is_ok());
    }
}
