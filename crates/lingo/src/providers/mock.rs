use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use super::base::{Provider, ProviderError, Usage};
use crate::models::message::Message;
use crate::models::tool::Tool;

/// One completion request as the mock saw it, so tests can assert which
/// agent's instructions and tools were in effect.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub system: String,
    pub tool_names: Vec<String>,
    pub message_count: usize,
}

/// A mock provider that returns pre-configured responses and records every
/// call it receives
pub struct MockProvider {
    responses: Arc<Mutex<Vec<Message>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<Message>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Handle onto the call log that stays valid after the provider is boxed
    pub fn call_log(&self) -> Arc<Mutex<Vec<RecordedCall>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(
        &self,
        model: &str,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
        _output_schema: Option<&Value>,
        _temperature: Option<f32>,
    ) -> Result<(Message, Usage), ProviderError> {
        self.calls.lock().unwrap().push(RecordedCall {
            model: model.to_string(),
            system: system.to_string(),
            tool_names: tools.iter().map(|t| t.name.clone()).collect(),
            message_count: messages.len(),
        });

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            // Return empty response if no more pre-configured responses
            Ok((Message::assistant().with_text(""), Usage::default()))
        } else {
            Ok((responses.remove(0), Usage::default()))
        }
    }
}

/// A provider whose every call fails with a retryable error
pub struct FailingProvider {
    attempts: Arc<Mutex<usize>>,
}

impl FailingProvider {
    pub fn new() -> Self {
        Self {
            attempts: Arc::new(Mutex::new(0)),
        }
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }

    pub fn attempt_counter(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.attempts)
    }
}

impl Default for FailingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for FailingProvider {
    async fn complete(
        &self,
        _model: &str,
        _system: &str,
        _messages: &[Message],
        _tools: &[Tool],
        _output_schema: Option<&Value>,
        _temperature: Option<f32>,
    ) -> Result<(Message, Usage), ProviderError> {
        *self.attempts.lock().unwrap() += 1;
        Err(ProviderError::RemoteCall("connection refused".to_string()))
    }
}
