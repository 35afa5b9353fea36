use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::message::Message;
use crate::models::tool::Tool;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// Failures at the remote completion boundary
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Request timed out after {0:?}")]
    RequestTimeout(Duration),

    /// Transport failures and server-side errors (429, 5xx). Retryable.
    #[error("Remote call failed: {0}")]
    RemoteCall(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Context length exceeded: {0}")]
    ContextLengthExceeded(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RequestTimeout(_) | ProviderError::RemoteCall(_)
        )
    }
}

/// Base trait for AI providers (OpenAI, Ollama, etc)
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generate the next message using the specified model and other parameters
    async fn complete(
        &self,
        model: &str,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
        output_schema: Option<&Value>,
        temperature: Option<f32>,
    ) -> Result<(Message, Usage), ProviderError>;
}

pub const DEFAULT_REMOTE_ATTEMPTS: usize = 3;

/// Call the provider with a bounded number of attempts, backing off
/// exponentially between retryable failures. Non-retryable errors and
/// exhaustion surface the last error to the caller.
#[allow(clippy::too_many_arguments)]
pub async fn complete_with_backoff(
    provider: &dyn Provider,
    model: &str,
    system: &str,
    messages: &[Message],
    tools: &[Tool],
    output_schema: Option<&Value>,
    temperature: Option<f32>,
    max_attempts: usize,
) -> Result<(Message, Usage), ProviderError> {
    let mut delay = Duration::from_millis(200);
    let mut attempt = 1;
    loop {
        match provider
            .complete(model, system, messages, tools, output_schema, temperature)
            .await
        {
            Ok(reply) => return Ok(reply),
            Err(error) if error.is_retryable() && attempt < max_attempts => {
                tracing::warn!(attempt, %error, "remote call failed, backing off");
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
