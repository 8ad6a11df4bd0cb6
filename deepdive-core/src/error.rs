use thiserror::Error;

/// Errors surfaced by a research run.
///
/// Provider failures inside a branch are swallowed and degraded locally;
/// these variants cover the cases that legitimately reach the caller
/// (bad configuration, cancellation) plus the internal taxonomy used to
/// log and classify what was swallowed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResearchError {
    /// Error from the language-model provider
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Error from the search provider
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// Query generation produced nothing usable for a branch
    #[error("Failed to generate search queries: {0}")]
    QueryGeneration(String),

    /// Failed to parse structured model output
    #[error("Failed to parse response: {0}")]
    ParseFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The run was cancelled through the context token
    #[error("Research cancelled")]
    Cancelled,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ResearchError {
    /// Check if this error is retriable (transient provider failures).
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ResearchError::Model(ModelError::Timeout(_))
                | ResearchError::Model(ModelError::RateLimit(_))
                | ResearchError::Search(SearchError::Timeout(_))
        )
    }

    /// Check if the run was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ResearchError::Cancelled)
    }
}

/// Errors from the language-model provider seam.
///
/// Retries and token-limit enforcement are the provider's responsibility;
/// by the time one of these surfaces, the provider has given up.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// Request timed out
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Response did not conform to the requested schema
    #[error("Malformed structured output: {0}")]
    Malformed(String),

    /// No content in response
    #[error("No content in response")]
    NoContent,

    /// Request was cancelled
    #[error("Request cancelled")]
    Cancelled,

    /// Other provider error
    #[error("{0}")]
    Other(String),
}

/// Errors from the web-search provider seam.
///
/// A timeout is treated identically to any other transport failure by the
/// orchestrator: the query is counted as completed with zero contribution.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SearchError {
    /// Transport-level failure (connection, HTTP status, provider outage)
    #[error("Search transport error: {0}")]
    Transport(String),

    /// Search timed out
    #[error("Search timed out after {0}ms")]
    Timeout(u64),

    /// Request was cancelled
    #[error("Search cancelled")]
    Cancelled,

    /// Other provider error
    #[error("{0}")]
    Other(String),
}
