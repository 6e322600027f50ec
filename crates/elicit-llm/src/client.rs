//! LLM client trait and the three-client wiring

use crate::types::{LlmRequest, LlmResponse};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub type LlmResult<T> = Result<T, LlmError>;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("timed out after {0}ms")]
    Timeout(u64),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("cancelled")]
    Cancelled,

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// A completion-capable LLM provider.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;

    /// Complete a request. If `cancel` is provided and triggered, the
    /// in-flight HTTP request is dropped and `LlmError::Cancelled` is
    /// returned.
    async fn complete(
        &self,
        request: LlmRequest,
        cancel: Option<CancellationToken>,
    ) -> LlmResult<LlmResponse>;
}

/// The three logical clients the pipeline uses: extraction reads
/// utterances into graphs, scoring reads conversation into signals,
/// generation writes questions. Each may point at a different model.
#[derive(Clone)]
pub struct LlmClients {
    pub extraction: Arc<dyn LlmClient>,
    pub scoring: Arc<dyn LlmClient>,
    pub generation: Arc<dyn LlmClient>,
}

impl LlmClients {
    pub fn new(
        extraction: Arc<dyn LlmClient>,
        scoring: Arc<dyn LlmClient>,
        generation: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            extraction,
            scoring,
            generation,
        }
    }

    /// All three roles served by a single client (tests, small setups).
    pub fn shared(client: Arc<dyn LlmClient>) -> Self {
        Self {
            extraction: client.clone(),
            scoring: client.clone(),
            generation: client,
        }
    }
}
