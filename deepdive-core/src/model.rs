//! Language-model provider seam.
//!
//! The orchestrator only depends on this trait: it hands over a trimmed
//! prompt plus a JSON schema and consumes typed results. Latency, retries
//! and token-limit enforcement live behind the trait.

use crate::error::ModelError;
use async_trait::async_trait;

/// Request for one structured-generation call.
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct ModelRequest {
    /// User prompt
    pub prompt: String,

    /// Optional system instruction
    pub system: Option<String>,

    /// JSON schema the response must conform to
    pub schema: Option<serde_json::Value>,

    /// Retries the provider should perform internally before giving up
    pub max_retries: u32,
}

impl ModelRequest {
    /// Create a new request with just a prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// Create a new request with prompt and system instruction.
    pub fn with_system(prompt: impl Into<String>, system: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: Some(system.into()),
            ..Default::default()
        }
    }

    /// Set a JSON schema for structured output.
    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Set the provider-side retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// A callable structured-generation model.
///
/// Implementations wrap a concrete LLM client (or a test double, see
/// [`crate::mock::MockModel`]). The returned value must conform to the
/// request schema when one is supplied.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a JSON value conforming to `request.schema`.
    async fn generate_object(&self, request: ModelRequest) -> Result<serde_json::Value, ModelError>;
}
