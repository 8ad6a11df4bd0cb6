//! Research run configuration and prompt templates.

use crate::error::ResearchError;
use std::time::Duration;

/// Placeholder constants for template validation
mod placeholders {
    pub const SERP_QUERIES: &[&str] = &["{num}", "{topic}"];
    pub const LEARNINGS: &[&str] = &["{query}", "{contents}"];
    pub const REPORT: &[&str] = &["{topic}", "{learnings}"];
    pub const ANSWER: &[&str] = &["{topic}", "{learnings}"];
}

/// How the orchestrator picks the follow-up question that seeds the next,
/// deeper research level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FollowUpPolicy {
    /// First follow-up question scanning batch outcomes in dispatch order.
    /// Deterministic for a given set of outcomes.
    #[default]
    FirstByBranchIndex,

    /// First follow-up question in completion order. Nondeterministic under
    /// concurrent dispatch.
    FirstCompleted,
}

/// Prompts used across the research phases.
///
/// # Template Placeholders
///
/// - `serp_queries_template`: `{num}`, `{topic}`
/// - `learnings_template`: `{query}`, `{contents}`
/// - `report_template`: `{topic}`, `{learnings}`
/// - `answer_template`: `{topic}`, `{learnings}`
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ResearchPrompts {
    /// System instruction shared by every model call of a run.
    pub system: String,

    /// User template for query generation.
    pub serp_queries_template: String,

    /// User template for extracting learnings from search contents.
    pub learnings_template: String,

    /// User template for the final long-form report.
    pub report_template: String,

    /// User template for the final short answer.
    pub answer_template: String,
}

impl ResearchPrompts {
    /// Render the query-generation prompt, appending prior learnings when
    /// present so deeper levels narrow instead of repeating.
    pub fn render_serp_queries(&self, num: usize, topic: &str, learnings: &[String]) -> String {
        let mut prompt = self
            .serp_queries_template
            .replace("{num}", &num.to_string())
            .replace("{topic}", topic);
        if !learnings.is_empty() {
            prompt.push_str(
                "\n\nHere are some learnings from previous research, \
                 use them to generate more specific queries: ",
            );
            prompt.push_str(&learnings.join("\n"));
        }
        prompt
    }

    /// Render the learnings-extraction prompt.
    ///
    /// `{contents}` is replaced before `{query}` so scraped content
    /// containing a literal `{query}` is not substituted.
    pub fn render_learnings(
        &self,
        query: &str,
        contents: &[String],
        num_learnings: usize,
        num_follow_ups: usize,
    ) -> String {
        let contents_block = contents
            .iter()
            .map(|content| format!("<content>\n{}\n</content>", content))
            .collect::<Vec<_>>()
            .join("\n");
        self.learnings_template
            .replace("{contents}", &contents_block)
            .replace("{query}", query)
            .replace("{num_learnings}", &num_learnings.to_string())
            .replace("{num_follow_ups}", &num_follow_ups.to_string())
    }

    /// Render the final-report prompt.
    pub fn render_report(&self, topic: &str, learnings: &[String]) -> String {
        self.report_template
            .replace("{learnings}", &wrap_learnings(learnings))
            .replace("{topic}", topic)
    }

    /// Render the final-answer prompt.
    pub fn render_answer(&self, topic: &str, learnings: &[String]) -> String {
        self.answer_template
            .replace("{learnings}", &wrap_learnings(learnings))
            .replace("{topic}", topic)
    }

    /// Validate that all prompts are non-empty and templates contain their
    /// required placeholders.
    pub fn validate(&self) -> Result<(), ResearchError> {
        let mut errors = Vec::new();

        let required = [
            ("system", &self.system, &[][..]),
            (
                "serp_queries_template",
                &self.serp_queries_template,
                placeholders::SERP_QUERIES,
            ),
            (
                "learnings_template",
                &self.learnings_template,
                placeholders::LEARNINGS,
            ),
            ("report_template", &self.report_template, placeholders::REPORT),
            ("answer_template", &self.answer_template, placeholders::ANSWER),
        ];

        for (name, template, placeholders) in required {
            if template.trim().is_empty() {
                errors.push(format!("{} cannot be empty", name));
                continue;
            }
            let missing: Vec<&str> = placeholders
                .iter()
                .filter(|p| !template.contains(**p))
                .copied()
                .collect();
            if !missing.is_empty() {
                errors.push(format!(
                    "{} missing required placeholders: {}",
                    name,
                    missing.join(", ")
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ResearchError::InvalidConfig(errors.join("; ")))
        }
    }
}

fn wrap_learnings(learnings: &[String]) -> String {
    learnings
        .iter()
        .map(|learning| format!("<learning>\n{}\n</learning>", learning))
        .collect::<Vec<_>>()
        .join("\n")
}

impl Default for ResearchPrompts {
    fn default() -> Self {
        Self {
            system: "You are an expert researcher. Be as detailed and accurate as possible. \
                     Treat the user as a highly experienced analyst; be highly organized, \
                     proactive, and flag speculation clearly."
                .to_string(),
            serp_queries_template: "Given the following prompt from the user, generate a list \
                 of SERP queries to research the topic. Return a maximum of {num} queries, but \
                 feel free to return less if the original prompt is clear. Make sure each query \
                 is unique and not similar to each other: <prompt>{topic}</prompt>"
                .to_string(),
            learnings_template: "Given the following contents from a SERP search for the query \
                 <query>{query}</query>, generate a list of learnings from the contents. Return \
                 a maximum of {num_learnings} learnings, but feel free to return less if the \
                 contents are clear. Make sure each learning is unique and not similar to each \
                 other. The learnings should be concise and to the point, as detailed and \
                 information dense as possible. Make sure to include any entities like people, \
                 places, companies, products, things, etc in the learnings, as well as any exact \
                 metrics, numbers, or dates. The learnings will be used to research the topic \
                 further. Also return up to {num_follow_ups} follow-up questions to research \
                 the topic further.\n\n<contents>{contents}</contents>"
                .to_string(),
            report_template: "Given the following prompt from the user, write a final report \
                 on the topic using the learnings from research. Make it as detailed as \
                 possible, aim for 3 or more pages, include ALL the learnings from \
                 research:\n\n<prompt>{topic}</prompt>\n\nHere are all the learnings from \
                 previous research:\n\n<learnings>\n{learnings}\n</learnings>"
                .to_string(),
            answer_template: "Given the following prompt from the user, write a final answer \
                 on the topic using the learnings from research. Follow the format specified in \
                 the prompt. Do not include any other text than the answer besides the format \
                 specified in the prompt. Keep the answer as concise as possible - usually it \
                 should be just a few words or maximum a \
                 sentence.\n\n<prompt>{topic}</prompt>\n\nHere are all the learnings from \
                 research on the topic that you can use to help answer the \
                 prompt:\n\n<learnings>\n{learnings}\n</learnings>"
                .to_string(),
        }
    }
}

/// Configuration for one research run.
#[derive(Debug, Clone)]
pub struct ResearchConfig {
    /// Recursion depth ceiling.
    ///
    /// Default: 15
    pub max_depth: u32,

    /// Fan-out width of the first level; halved (rounded up) per level.
    ///
    /// Default: 7
    pub total_breadth: u32,

    /// Maximum search queries generated per level.
    ///
    /// Default: 5
    pub queries_per_level: usize,

    /// Maximum simultaneous in-flight search calls within a batch.
    ///
    /// Default: 2
    pub search_concurrency: usize,

    /// Maximum result items requested per search call.
    ///
    /// Default: 2
    pub max_results_per_query: usize,

    /// Provider-level timeout per search call.
    ///
    /// Default: 10 seconds
    pub search_timeout: Duration,

    /// Delay before each dispatch after the first within a batch. Rate-
    /// limiting courtesy to the search provider, not a correctness knob.
    ///
    /// Default: 5 seconds
    pub stagger_delay: Duration,

    /// Pause between individual `research-learning` events. Presentation
    /// pacing only; zero is fully correct.
    ///
    /// Default: 20 milliseconds
    pub learning_pacing: Duration,

    /// Maximum learnings requested per processed search result.
    ///
    /// Default: 3
    pub num_learnings: usize,

    /// Token budget applied to each result item's content before it enters
    /// the extraction prompt.
    ///
    /// Default: 25 000
    pub content_token_budget: usize,

    /// Provider-side retry budget for the extraction call.
    ///
    /// Default: 5
    pub extraction_retries: u32,

    /// Size of each `research-report-chunk` in characters.
    ///
    /// Default: 1000
    pub report_chunk_size: usize,

    /// Pause between report chunk emissions. Presentation pacing only.
    ///
    /// Default: 50 milliseconds
    pub chunk_pacing: Duration,

    /// How the next level's seed question is selected.
    ///
    /// Default: [`FollowUpPolicy::FirstByBranchIndex`]
    pub follow_up_policy: FollowUpPolicy,

    /// Prompts for every model call of the run.
    pub prompts: ResearchPrompts,
}

impl ResearchConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ResearchError> {
        let mut errors = Vec::new();

        if self.queries_per_level == 0 {
            errors.push("queries_per_level must be greater than 0".to_string());
        }
        if self.search_concurrency == 0 {
            errors.push("search_concurrency must be greater than 0".to_string());
        }
        if self.max_results_per_query == 0 {
            errors.push("max_results_per_query must be greater than 0".to_string());
        }
        if self.report_chunk_size == 0 {
            errors.push("report_chunk_size must be greater than 0".to_string());
        }
        if self.content_token_budget == 0 {
            errors.push("content_token_budget must be greater than 0".to_string());
        }

        if let Err(ResearchError::InvalidConfig(prompt_errors)) = self.prompts.validate() {
            errors.push(prompt_errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ResearchError::InvalidConfig(errors.join("; ")))
        }
    }
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_depth: 15,
            total_breadth: 7,
            queries_per_level: 5,
            search_concurrency: 2,
            max_results_per_query: 2,
            search_timeout: Duration::from_secs(10),
            stagger_delay: Duration::from_secs(5),
            learning_pacing: Duration::from_millis(20),
            num_learnings: 3,
            content_token_budget: 25_000,
            extraction_retries: 5,
            report_chunk_size: 1000,
            chunk_pacing: Duration::from_millis(50),
            follow_up_policy: FollowUpPolicy::default(),
            prompts: ResearchPrompts::default(),
        }
    }
}
