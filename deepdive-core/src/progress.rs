//! Run-scoped research progress aggregate and its tracker.
//!
//! One `ResearchProgress` exists per run, shared across every concurrent
//! branch through [`ProgressTracker`]. Updates are merge operations: counters
//! only advance, learnings only append, so interleaved writers cannot undo
//! each other's contributions. Every merge immediately emits a full snapshot
//! to the progress sink.

use crate::event::{ProgressStatus, ProgressSink, ResearchEvent};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Aggregate state of one research run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchProgress {
    /// Depth ceiling fixed at run start.
    pub total_depth: u32,
    /// Breadth ceiling fixed at run start.
    pub total_breadth: u32,
    /// Levels descended so far; non-decreasing.
    pub current_depth: u32,
    /// Batch width of the current level.
    pub current_breadth: u32,
    /// Queries generated so far across all levels; monotonically increasing.
    pub total_queries: u32,
    /// Queries attempted so far, success or failure; monotonically increasing.
    pub completed_queries: u32,
    /// Last query dispatched. Advisory only: concurrent branches overwrite
    /// it in completion order, which is not dispatch order.
    pub current_query: String,
    /// Distinct learnings in discovery order; append-only.
    pub learnings: Vec<String>,
}

impl ResearchProgress {
    /// Fresh progress with the run's fixed ceilings.
    pub fn new(total_depth: u32, total_breadth: u32) -> Self {
        Self {
            total_depth,
            total_breadth,
            ..Default::default()
        }
    }
}

/// A partial, merge-only update to [`ResearchProgress`].
///
/// Counter fields are deltas rather than absolute values so that
/// concurrent branches cannot clobber each other's increments.
#[derive(Debug, Clone, Default)]
pub struct ProgressUpdate {
    set_depth: Option<u32>,
    set_breadth: Option<u32>,
    add_total_queries: u32,
    completed_queries: u32,
    current_query: Option<String>,
    learnings: Vec<String>,
}

impl ProgressUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record descent to a new level.
    pub fn depth(mut self, depth: u32) -> Self {
        self.set_depth = Some(depth);
        self
    }

    /// Record the batch width of the current level.
    pub fn breadth(mut self, breadth: u32) -> Self {
        self.set_breadth = Some(breadth);
        self
    }

    /// Add newly generated queries to the total.
    pub fn add_total_queries(mut self, count: u32) -> Self {
        self.add_total_queries += count;
        self
    }

    /// Count one attempted query, success or failure.
    pub fn query_completed(mut self) -> Self {
        self.completed_queries += 1;
        self
    }

    /// Record the query currently being dispatched.
    pub fn current_query(mut self, query: impl Into<String>) -> Self {
        self.current_query = Some(query.into());
        self
    }

    /// Append learnings; duplicates of already-recorded strings are dropped.
    pub fn learnings(mut self, learnings: Vec<String>) -> Self {
        self.learnings = learnings;
        self
    }
}

/// Holds the canonical [`ResearchProgress`] and emits a snapshot per update.
///
/// Safe to share across concurrent branches behind an `Arc`; the lock is
/// never held across an await point.
pub struct ProgressTracker {
    inner: Mutex<ResearchProgress>,
    sink: ProgressSink,
}

impl ProgressTracker {
    pub fn new(total_depth: u32, total_breadth: u32, sink: ProgressSink) -> Self {
        Self {
            inner: Mutex::new(ResearchProgress::new(total_depth, total_breadth)),
            sink,
        }
    }

    /// Emit the initial snapshot tagged `started`, carrying the run topic.
    pub async fn start(&self, topic: &str) {
        let snapshot = self.snapshot();
        self.sink
            .emit(ResearchEvent::progress_started(&snapshot, topic))
            .await;
    }

    /// Merge a partial update and emit the resulting snapshot.
    pub async fn update(&self, update: ProgressUpdate) {
        let snapshot = {
            let mut progress = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(depth) = update.set_depth {
                progress.current_depth = progress.current_depth.max(depth);
            }
            if let Some(breadth) = update.set_breadth {
                progress.current_breadth = progress.current_breadth.max(breadth);
            }
            progress.total_queries += update.add_total_queries;
            progress.completed_queries += update.completed_queries;
            if let Some(query) = update.current_query {
                progress.current_query = query;
            }
            for learning in update.learnings {
                if !progress.learnings.contains(&learning) {
                    progress.learnings.push(learning);
                }
            }
            progress.clone()
        };

        log::info!(
            "Research progress: Depth {}/{}, Breadth {}/{}, Queries {}/{}",
            snapshot.current_depth,
            snapshot.total_depth,
            snapshot.current_breadth,
            snapshot.total_breadth,
            snapshot.completed_queries,
            snapshot.total_queries,
        );

        self.sink
            .emit(ResearchEvent::progress(
                &snapshot,
                ProgressStatus::InProgress,
            ))
            .await;
    }

    /// Copy of the current aggregate.
    pub fn snapshot(&self) -> ResearchProgress {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Distinct learnings accumulated so far, in discovery order.
    pub fn learnings(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .learnings
            .clone()
    }
}
