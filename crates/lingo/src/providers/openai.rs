use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};

use super::base::{Provider, ProviderError, Usage};
use super::configs::OpenAiProviderConfig;
use super::utils::{
    check_context_length_error, messages_to_openai_spec, openai_response_to_message,
    tools_to_openai_spec,
};
use crate::models::message::Message;
use crate::models::tool::Tool;
use async_trait::async_trait;

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::RemoteCall(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn get_usage(data: &Value) -> Usage {
        let usage = match data.get("usage") {
            Some(usage) => usage,
            None => return Usage::default(),
        };

        let input_tokens = usage
            .get("prompt_tokens")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32);

        let output_tokens = usage
            .get("completion_tokens")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32);

        let total_tokens = usage
            .get("total_tokens")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32)
            .or_else(|| match (input_tokens, output_tokens) {
                (Some(input), Some(output)) => Some(input + output),
                _ => None,
            });

        Usage::new(input_tokens, output_tokens, total_tokens)
    }

    async fn post(&self, payload: Value) -> Result<Value, ProviderError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
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
impl Provider for OpenAiProvider {
    async fn complete(
        &self,
        model: &str,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
        output_schema: Option<&Value>,
        temperature: Option<f32>,
    ) -> Result<(Message, Usage), ProviderError> {
        let system_message = json!({
            "role": "system",
            "content": system
        });

        let messages_spec = messages_to_openai_spec(messages);
        let tools_spec = if !tools.is_empty() {
            tools_to_openai_spec(tools)?
        } else {
            vec![]
        };

        // create messages array with system message first
        let mut messages_array = vec![system_message];
        messages_array.extend(messages_spec);

        let mut payload = json!({
            "model": model,
            "messages": messages_array
        });

        if !tools_spec.is_empty() {
            payload
                .as_object_mut()
                .unwrap()
                .insert("tools".to_string(), json!(tools_spec));
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

        // Raise specific error if context length is exceeded
        if let Some(error) = response.get("error") {
            if let Some(err) = check_context_length_error(error) {
                return Err(err);
            }
            return Err(ProviderError::Api(format!("OpenAI API error: {}", error)));
        }

        let message = openai_response_to_message(response.clone())?;
        let usage = Self::get_usage(&response);

        Ok((message, usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup_mock_server(response_body: Value) -> (MockServer, OpenAiProvider) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(response_body))
            .mount(&mock_server)
            .await;

        let config = OpenAiProviderConfig::new(mock_server.uri(), "test_api_key".to_string());
        let provider = OpenAiProvider::new(config).unwrap();
        (mock_server, provider)
    }

    #[tokio::test]
    async fn test_complete_basic() {
        let response_body = json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "Bonjour! Comment puis-je vous aider?",
                    "tool_calls": null
                },
                "finish_reason": "stop"
            }],
            "usage": {
                "prompt_tokens": 12,
                "completion_tokens": 15,
                "total_tokens": 27
            }
        });

        let (_, provider) = setup_mock_server(response_body).await;

        let messages = vec![Message::user().with_text("Bonjour?")];

        let (message, usage) = provider
            .complete(
                "gpt-4o-mini",
                "You are a French tutor.",
                &messages,
                &[],
                None,
                None,
            )
            .await
            .unwrap();

        assert_eq!(message.text(), "Bonjour! Comment puis-je vous aider?");
        assert_eq!(usage.input_tokens, Some(12));
        assert_eq!(usage.output_tokens, Some(15));
        assert_eq!(usage.total_tokens, Some(27));
    }

    #[tokio::test]
    async fn test_complete_tool_request() {
        let response_body = json!({
            "id": "chatcmpl-tool",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_123",
                        "type": "function",
                        "function": {
                            "name": "save_learner_profile",
                            "arguments": "{\"target_language\":\"French\"}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {
                "prompt_tokens": 20,
                "completion_tokens": 15,
                "total_tokens": 35
            }
        });

        let (_, provider) = setup_mock_server(response_body).await;

        let messages = vec![Message::user().with_text("I want to learn French")];

        let tool = Tool::new(
            "save_learner_profile",
            "Record what the learner wants to study",
            json!({
                "type": "object",
                "properties": {
                    "target_language": {
                        "type": "string",
                        "description": "The language the learner wants to study"
                    }
                },
                "required": ["target_language"]
            }),
        );

        let (message, usage) = provider
            .complete(
                "gpt-4o-mini",
                "You are a language tutor.",
                &messages,
                &[tool],
                None,
                None,
            )
            .await
            .unwrap();

        let requests = message.tool_requests();
        assert_eq!(requests.len(), 1);
        let tool_call = requests[0].tool_call.as_ref().unwrap();
        assert_eq!(tool_call.name, "save_learner_profile");
        assert_eq!(tool_call.arguments, json!({"target_language": "French"}));
        assert_eq!(usage.total_tokens, Some(35));
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let config = OpenAiProviderConfig::new(mock_server.uri(), "test_api_key".to_string());
        let provider = OpenAiProvider::new(config).unwrap();

        let err = provider
            .complete("gpt-4o-mini", "system", &[], &[], None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::RemoteCall(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_client_error_is_not_retryable() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let config = OpenAiProviderConfig::new(mock_server.uri(), "bad_key".to_string());
        let provider = OpenAiProvider::new(config).unwrap();

        let err = provider
            .complete("gpt-4o-mini", "system", &[], &[], None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Api(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_context_length_error() {
        let response_body = json!({
            "error": {
                "code": "context_length_exceeded",
                "message": "This model's maximum context length was exceeded"
            }
        });

        let (_, provider) = setup_mock_server(response_body).await;

        let err = provider
            .complete("gpt-4o-mini", "system", &[], &[], None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::ContextLengthExceeded(_)));
    }
}
