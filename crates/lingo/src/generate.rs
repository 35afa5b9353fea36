//! Structured output from an unreliable text generator.
//!
//! [`generate_structured`] wraps a generation call in a bounded
//! validate-and-repair loop: raw output is decoded against a target type, and
//! on failure the model is re-invoked with a correction prompt that embeds the
//! invalid output verbatim and asks it to fix the defect. Every attempt is
//! recorded so failure-mode frequency can be audited offline. Exhaustion
//! produces a typed [`Generated::Failed`] value, never a propagated parse
//! error: the caller is typically a UI layer.

use async_trait::async_trait;
use indoc::formatdoc;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::models::message::Message;
use crate::providers::base::{Provider, ProviderError};

pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// An injectable text generation dependency, so retry-count and failure-path
/// tests do not need a live model
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Adapts any [`Provider`] into a one-shot text generator
pub struct ProviderGenerator<'a> {
    provider: &'a dyn Provider,
    model: String,
    instructions: String,
    output_schema: Option<Value>,
    temperature: Option<f32>,
}

impl<'a> ProviderGenerator<'a> {
    pub fn new<M, I>(provider: &'a dyn Provider, model: M, instructions: I) -> Self
    where
        M: Into<String>,
        I: Into<String>,
    {
        Self {
            provider,
            model: model.into(),
            instructions: instructions.into(),
            output_schema: None,
            temperature: None,
        }
    }

    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[async_trait]
impl Generator for ProviderGenerator<'_> {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let messages = vec![Message::user().with_text(prompt)];
        let (message, _usage) = self
            .provider
            .complete(
                &self.model,
                &self.instructions,
                &messages,
                &[],
                self.output_schema.as_ref(),
                self.temperature,
            )
            .await?;
        Ok(message.text())
    }
}

/// One generation attempt; `error` is None on the successful attempt
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub index: usize,
    pub error: Option<String>,
}

/// The final result of a bounded repair loop
#[derive(Debug)]
pub enum Generated<T> {
    Valid { value: T, attempts: Vec<Attempt> },
    Failed { attempts: Vec<Attempt> },
}

impl<T> Generated<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Generated::Valid { value, .. } => Some(value),
            Generated::Failed { .. } => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Generated::Valid { value, .. } => Some(value),
            Generated::Failed { .. } => None,
        }
    }

    pub fn attempts(&self) -> &[Attempt] {
        match self {
            Generated::Valid { attempts, .. } | Generated::Failed { attempts } => attempts,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Generated::Failed { .. })
    }
}

/// Obtain a value conforming to the target type from the generator, with at
/// most `max_attempts` attempts. The first attempt sends `prompt`; each
/// subsequent attempt sends a correction prompt built from the previous
/// invalid output.
pub async fn generate_structured<T: DeserializeOwned>(
    generator: &dyn Generator,
    prompt: &str,
    schema: &Value,
    max_attempts: usize,
) -> Generated<T> {
    let mut attempts = Vec::new();
    let mut next_prompt = prompt.to_string();

    for index in 1..=max_attempts.max(1) {
        match generator.generate(&next_prompt).await {
            Ok(raw) => match serde_json::from_str::<T>(strip_code_fences(&raw)) {
                Ok(value) => {
                    tracing::debug!(attempt = index, "structured generation succeeded");
                    attempts.push(Attempt { index, error: None });
                    return Generated::Valid { value, attempts };
                }
                Err(error) => {
                    tracing::warn!(attempt = index, %error, raw = %raw, "structured output failed to validate");
                    attempts.push(Attempt {
                        index,
                        error: Some(error.to_string()),
                    });
                    next_prompt = correction_prompt(&raw, &error.to_string(), schema);
                }
            },
            Err(error) => {
                // Nothing to repair; re-send the original request
                tracing::warn!(attempt = index, %error, "generation call failed");
                attempts.push(Attempt {
                    index,
                    error: Some(error.to_string()),
                });
                next_prompt = prompt.to_string();
            }
        }
    }

    tracing::warn!(
        attempts = attempts.len(),
        "structured generation exhausted its attempt budget"
    );
    Generated::Failed { attempts }
}

fn correction_prompt(raw: &str, error: &str, schema: &Value) -> String {
    formatdoc! {"
        You previously produced output that failed validation.

        Invalid output:
        ```
        {raw}
        ```

        Validation error: {error}

        The output must be a single JSON value conforming to this schema:
        {schema}

        Identify the defect and respond with corrected JSON only, with no
        surrounding text.
    "}
}

/// Models often wrap JSON in markdown code fences even when told not to
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
