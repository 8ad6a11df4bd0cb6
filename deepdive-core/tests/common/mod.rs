//! Shared helpers for integration tests.

use deepdive_core::{
    MockModel, MockSearch, ResearchConfig, ResearchContext, SerpQuery,
};
use std::sync::Arc;
use std::time::Duration;

/// Initialize logging once; safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Config with all pacing and stagger delays zeroed so tests run fast.
pub fn fast_config(max_depth: u32, total_breadth: u32, queries_per_level: usize) -> ResearchConfig {
    ResearchConfig {
        max_depth,
        total_breadth,
        queries_per_level,
        search_timeout: Duration::from_secs(5),
        stagger_delay: Duration::ZERO,
        learning_pacing: Duration::ZERO,
        chunk_pacing: Duration::ZERO,
        ..Default::default()
    }
}

pub fn context(model: &MockModel, search: &MockSearch) -> ResearchContext {
    ResearchContext::new(Arc::new(model.clone()), Arc::new(search.clone()))
}

pub fn serp_query(query: &str, goal: &str) -> SerpQuery {
    SerpQuery {
        query: query.to_string(),
        research_goal: goal.to_string(),
    }
}

/// `count` distinct queries named `query 0` .. `query count-1`.
pub fn numbered_queries(count: usize) -> Vec<SerpQuery> {
    (0..count)
        .map(|i| serp_query(&format!("query {i}"), &format!("goal {i}")))
        .collect()
}
