//! # Deepdive Core
//!
//! Library for deep, iterative web research: a topic is broken into search
//! queries, each query is searched and its contents distilled into learnings,
//! and follow-up questions drive progressively narrower research levels until
//! the depth budget runs out. A final model pass synthesizes everything into
//! a combined answer and report.
//!
//! ## Architecture
//!
//! - **Streaming-first**: runs push soft-typed [`ResearchEvent`]s through a
//!   [`ProgressSink`] as they work, so consumers render progress live
//! - **Provider seams**: [`LanguageModel`] and [`SearchProvider`] traits keep
//!   the orchestration independent of any concrete LLM or search backend
//! - **Degrade, don't abort**: a failed branch contributes nothing but never
//!   sinks the run; only cancellation and bad configuration error out
//!
//! ## Example
//!
//! ```no_run
//! use deepdive_core::{
//!     MockModel, MockSearch, ResearchConfig, ResearchContext, ResearchOrchestrator,
//! };
//! use futures_util::StreamExt;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let context = ResearchContext::new(
//!     Arc::new(MockModel::new()),
//!     Arc::new(MockSearch::new()),
//! );
//! let orchestrator = ResearchOrchestrator::new(ResearchConfig::default())?;
//!
//! let stream = orchestrator.execute(context, "What is quantum computing?");
//! futures_util::pin_mut!(stream);
//! while let Some(event) = stream.next().await {
//!     println!("[{}] {}", event.event_type, event.message);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod extract;
pub mod mock;
pub mod model;
pub mod orchestrator;
pub mod progress;
pub mod queries;
pub mod search;
pub mod synthesize;
pub mod trim;

// Re-export public API
pub use config::{FollowUpPolicy, ResearchConfig, ResearchPrompts};
pub use error::{ModelError, ResearchError, SearchError};
pub use event::{
    ProgressSink, ProgressStatus, ReportChunk, ResearchEvent, RunTotals,
    EVENT_RESEARCH_COMPLETE, EVENT_RESEARCH_LEARNING, EVENT_RESEARCH_PROGRESS,
    EVENT_RESEARCH_REPORT_CHUNK, EVENT_SEARCH_KEYWORD, EVENT_SOURCE_LOGGER,
};
pub use extract::ProcessedResult;
pub use mock::{MockModel, MockSearch};
pub use model::{LanguageModel, ModelRequest};
pub use orchestrator::{ResearchContext, ResearchOrchestrator, ResearchReport};
pub use progress::{ProgressTracker, ProgressUpdate, ResearchProgress};
pub use queries::SerpQuery;
pub use search::{SearchOptions, SearchProvider, SearchResponse, SearchResultItem};
pub use synthesize::ReportAssembler;
pub use trim::{estimate_tokens, split_text, trim_prompt};
