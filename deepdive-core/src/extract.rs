//! Learning extraction from search result contents.

use crate::config::ResearchPrompts;
use crate::model::{LanguageModel, ModelRequest};
use crate::trim::trim_prompt;
use serde::Deserialize;
use serde_json::json;

/// Token budget for the fully assembled extraction prompt. Per-item content
/// gets its own budget first; this caps the whole thing.
const EXTRACTION_PROMPT_BUDGET: usize = 128_000;

/// Learnings and follow-up questions produced from one query's results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedResult {
    pub learnings: Vec<String>,
    pub follow_up_questions: Vec<String>,
}

#[derive(Deserialize)]
struct LearningsPayload {
    learnings: Vec<String>,
    #[serde(rename = "followUpQuestions", default)]
    follow_up_questions: Vec<String>,
}

fn learnings_schema(num_learnings: usize, num_follow_ups: usize) -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "learnings": {
                "type": "array",
                "items": { "type": "string" },
                "description": format!("List of learnings, max of {num_learnings}")
            },
            "followUpQuestions": {
                "type": "array",
                "items": { "type": "string" },
                "description": format!(
                    "List of follow-up questions to research the topic further, \
                     max of {num_follow_ups}"
                )
            }
        },
        "required": ["learnings", "followUpQuestions"]
    })
}

/// Extract learnings and follow-up questions from one query's scraped
/// contents.
///
/// Empty contents short-circuit to an empty result without a model call.
/// Model failure degrades to a placeholder result built from the query
/// itself so a bad extraction never sinks the batch.
pub async fn process_serp_result(
    model: &dyn LanguageModel,
    prompts: &ResearchPrompts,
    query: &str,
    contents: &[String],
    num_learnings: usize,
    num_follow_ups: usize,
    content_token_budget: usize,
    max_retries: u32,
) -> ProcessedResult {
    if contents.is_empty() {
        log::debug!("No contents for query '{query}', skipping extraction");
        return ProcessedResult::default();
    }

    let trimmed: Vec<String> = contents
        .iter()
        .map(|content| trim_prompt(content, content_token_budget))
        .collect();
    log::debug!("Ran '{query}', found {} contents", trimmed.len());

    let prompt = trim_prompt(
        &prompts.render_learnings(query, &trimmed, num_learnings, num_follow_ups),
        EXTRACTION_PROMPT_BUDGET,
    );
    let request = ModelRequest::with_system(prompt, &prompts.system)
        .with_schema(learnings_schema(num_learnings, num_follow_ups))
        .with_max_retries(max_retries);

    let value = match model.generate_object(request).await {
        Ok(value) => value,
        Err(e) => {
            log::warn!("Learning extraction failed for '{query}': {e}, using fallback");
            return fallback_result(query);
        }
    };

    match serde_json::from_value::<LearningsPayload>(value) {
        Ok(payload) => {
            log::debug!(
                "Created {} learnings for '{query}'",
                payload.learnings.len()
            );
            ProcessedResult {
                learnings: payload.learnings,
                follow_up_questions: payload.follow_up_questions,
            }
        }
        Err(e) => {
            log::warn!("Malformed learnings payload for '{query}': {e}, using fallback");
            fallback_result(query)
        }
    }
}

fn fallback_result(query: &str) -> ProcessedResult {
    ProcessedResult {
        learnings: vec![query.to_string()],
        follow_up_questions: vec![format!("{query}?")],
    }
}
