//! Web-search provider seam.
//!
//! The provider accepts a query and returns scraped result items; the core
//! treats each item's URL as its deduplication and citation key. A timeout
//! or transport failure is handled identically by the orchestrator: the
//! query counts as attempted with zero contribution.

use crate::error::SearchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One scraped search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultItem {
    /// Source URL; citation and deduplication key.
    pub url: String,

    /// Scraped page content as markdown. Absent or empty items contribute
    /// nothing to result processing.
    #[serde(default)]
    pub markdown: Option<String>,
}

/// Response from one search call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub data: Vec<SearchResultItem>,
}

/// Per-call search parameters.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Provider-level timeout for this call.
    pub timeout: Duration,

    /// Maximum number of result items to return.
    pub limit: usize,
}

/// A callable search/extraction provider.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run one search query, returning scraped result items.
    async fn search(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> Result<SearchResponse, SearchError>;
}

impl SearchResponse {
    /// URLs of all items with a non-empty URL, in result order.
    pub fn urls(&self) -> Vec<String> {
        self.data
            .iter()
            .filter(|item| !item.url.is_empty())
            .map(|item| item.url.clone())
            .collect()
    }

    /// Non-empty markdown contents, in result order.
    pub fn contents(&self) -> Vec<&str> {
        self.data
            .iter()
            .filter_map(|item| item.markdown.as_deref())
            .filter(|content| !content.trim().is_empty())
            .collect()
    }
}
