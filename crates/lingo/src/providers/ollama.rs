use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};

use super::base::{Provider, ProviderError, Usage};
use super::configs::OllamaProviderConfig;
use super::utils::{messages_to_openai_spec, openai_response_to_message, tools_to_openai_spec};
use crate::models::message::Message;
use crate::models::tool::Tool;
use async_trait::async_trait;

/// Local Ollama endpoint, speaking the OpenAI-compatible chat API. No
/// credential is required.
pub struct OllamaProvider {
    client: Client,
    config: OllamaProviderConfig,
}

impl OllamaProvider {
    pub fn new(config: OllamaProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::RemoteCall(e.to_string()))?;

        Ok(Self { client, config })
    }

    async fn post(&self, payload: Value) -> Result<Value, ProviderError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self.client.post(&url).json(&payload).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::RequestTimeout(self.config.timeout)
            } else {
                ProviderError::RemoteCall(e.to_string())
            }
        })?;

        match response.status() {
            StatusCode::OK => response
                .json()
                .await
                .map_err(|e| ProviderError::MalformedResponse(e.to_string())),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(ProviderError::RemoteCall(format!("Server error: {}", status)))
            }
            status => Err(ProviderError::Api(format!("Request failed: {}", status))),
        }
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn complete(
        &self,
        model: &str,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
        output_schema: Option<&Value>,
        temperature: Option<f32>,
    ) -> Result<(Message, Usage), ProviderError> {
        let mut messages_array = vec![json!({
            "role": "system",
            "content": system
        })];
        messages_array.extend(messages_to_openai_spec(messages));

        let mut payload = json!({
            "model": model,
            "messages": messages_array
        });

        if !tools.is_empty() {
            payload
                .as_object_mut()
                .unwrap()
                .insert("tools".to_string(), json!(tools_to_openai_spec(tools)?));
        }
        if let Some(temp) = temperature {
            payload
                .as_object_mut()
                .unwrap()
                .insert("temperature".to_string(), json!(temp));
        }
        if let Some(schema) = output_schema {
            payload.as_object_mut().unwrap().insert(
                "response_format".to_string(),
                json!({
                    "type": "json_schema",
                    "json_schema": {
                        "name": "structured_output",
                        "schema": schema
                    }
                }),
            );
        }

        let response = self.post(payload).await?;
        let message = openai_response_to_message(response)?;

        // Ollama reports no token usage on this endpoint
        Ok((message, Usage::default()))
    }
}
