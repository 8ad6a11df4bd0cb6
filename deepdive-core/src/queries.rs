//! SERP query generation.

use crate::config::ResearchPrompts;
use crate::error::ResearchError;
use crate::model::{LanguageModel, ModelRequest};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// A single generated search query with the goal it serves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SerpQuery {
    /// The literal query string handed to the search provider.
    pub query: String,

    /// What this query is expected to uncover, and how to advance the
    /// research once it has. Carried along for prompt context.
    #[serde(rename = "researchGoal", default)]
    pub research_goal: String,
}

#[derive(Deserialize)]
struct SerpQueriesPayload {
    queries: Vec<SerpQuery>,
}

fn serp_queries_schema(num: usize) -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "queries": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "query": { "type": "string" },
                        "researchGoal": { "type": "string" }
                    },
                    "required": ["query", "researchGoal"]
                },
                "description": format!("List of SERP queries, max of {num}")
            }
        },
        "required": ["queries"]
    })
}

/// Ask the model for up to `num` search queries for `topic`.
///
/// Prior `learnings` steer deeper levels toward narrower queries. The model
/// may return fewer queries than requested; any excess is truncated.
pub async fn generate_serp_queries(
    model: &dyn LanguageModel,
    prompts: &ResearchPrompts,
    topic: &str,
    learnings: &[String],
    num: usize,
) -> Result<Vec<SerpQuery>, ResearchError> {
    let prompt = prompts.render_serp_queries(num, topic, learnings);
    let request = ModelRequest::with_system(prompt, &prompts.system)
        .with_schema(serp_queries_schema(num));

    let value = model
        .generate_object(request)
        .await
        .map_err(|e| ResearchError::QueryGeneration(e.to_string()))?;

    let payload: SerpQueriesPayload = serde_json::from_value(value)
        .map_err(|e| ResearchError::ParseFailed(format!("serp queries: {e}")))?;

    let mut queries = payload.queries;
    if queries.len() > num {
        log::warn!(
            "Model returned {} queries, truncating to {}",
            queries.len(),
            num
        );
        queries.truncate(num);
    }

    log::debug!(
        "Generated {} queries: {:?}",
        queries.len(),
        queries.iter().map(|q| &q.query).collect::<Vec<_>>()
    );

    Ok(queries)
}
