use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use super::base::{Provider, Usage};
use super::configs::OpenAiProviderConfig;
use super::utils::{messages_to_openai_spec, openai_response_to_message, tools_to_openai_spec};
use crate::errors::ProviderError;
use crate::models::message::Message;
use crate::models::tool::Tool;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, config })
    }

    fn get_usage(data: &Value) -> Usage {
        let Some(usage) = data.get("usage") else {
            return Usage::default();
        };
        let as_i32 = |key: &str| usage.get(key).and_then(Value::as_i64).map(|v| v as i32);
        Usage::new(
            as_i32("prompt_tokens"),
            as_i32("completion_tokens"),
            as_i32("total_tokens"),
        )
    }

    async fn post(&self, path: &str, payload: &Value) -> Result<Value, ProviderError> {
        let url = format!("{}{}", self.config.host.trim_end_matches('/'), path);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(payload)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        match response.status() {
            StatusCode::OK => response
                .json()
                .await
                .map_err(|e| ProviderError::Malformed(e.to_string())),
            StatusCode::TOO_MANY_REQUESTS => {
                let body = response.text().await.unwrap_or_default();
                // The same status carries both the per-window limit and the
                // hard daily quota; only the latter is hopeless today.
                if body.contains("insufficient_quota") {
                    Err(ProviderError::QuotaExhausted)
                } else {
                    Err(ProviderError::RateLimited)
                }
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ProviderError::Forbidden),
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(ProviderError::Api {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    async fn generate_image_once(&self, prompt: &str) -> Result<String, ProviderError> {
        let payload = json!({
            "model": self.config.image_model,
            "prompt": prompt,
            "n": 1,
            "response_format": "b64_json"
        });
        let response = self.post("/v1/images/generations", &payload).await?;

        match response["data"][0]["b64_json"].as_str() {
            Some(b64) if !b64.is_empty() => Ok(format!("data:image/png;base64,{b64}")),
            _ => Err(ProviderError::Refused),
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(Message, Usage), ProviderError> {
        let system_message = json!({
            "role": "system",
            "content": system
        });

        let messages_spec = messages_to_openai_spec(messages);
        let tools_spec = if tools.is_empty() {
            vec![]
        } else {
            tools_to_openai_spec(tools).map_err(|e| ProviderError::Malformed(e.to_string()))?
        };

        let mut messages_array = vec![system_message];
        messages_array.extend(messages_spec);

        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_array
        });
        if !tools_spec.is_empty() {
            payload
                .as_object_mut()
                .unwrap()
                .insert("tools".to_string(), json!(tools_spec));
        }
        if let Some(temp) = self.config.temperature {
            payload
                .as_object_mut()
                .unwrap()
                .insert("temperature".to_string(), json!(temp));
        }
        if let Some(tokens) = self.config.max_tokens {
            payload
                .as_object_mut()
                .unwrap()
                .insert("max_tokens".to_string(), json!(tokens));
        }

        let response = self.post("/v1/chat/completions", &payload).await?;

        if let Some(error) = response.get("error") {
            return Err(ProviderError::Api {
                status: 200,
                message: error.to_string(),
            });
        }

        let message = openai_response_to_message(&response)
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        let usage = Self::get_usage(&response);

        Ok((message, usage))
    }

    async fn generate_image(&self, prompt: &str) -> Result<String, ProviderError> {
        match self.generate_image_once(prompt).await {
            Err(ProviderError::Refused) => {
                tracing::warn!("image model returned no image data, retrying once");
                self.generate_image_once(prompt).await
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::MessageContent;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> OpenAiProvider {
        OpenAiProvider::new(OpenAiProviderConfig {
            host: server.uri(),
            api_key: "test_api_key".to_string(),
            model: "gpt-4o-mini".to_string(),
            image_model: "gpt-image-1".to_string(),
            temperature: Some(0.7),
            max_tokens: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_complete_basic() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": {"role": "assistant", "content": "Wa alaykum as-salam!"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17}
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let messages = vec![Message::user().with_text("Salam!")];
        let (message, usage) = provider
            .complete("You are a helpful assistant.", &messages, &[])
            .await
            .unwrap();

        assert_eq!(message.text(), "Wa alaykum as-salam!");
        assert_eq!(usage.input_tokens, Some(12));
        assert_eq!(usage.total_tokens, Some(17));
    }

    #[tokio::test]
    async fn test_complete_tool_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {
                                "name": "search_verse",
                                "arguments": "{\"query\":\"patience\"}"
                            }
                        }]
                    },
                    "finish_reason": "tool_calls"
                }]
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let messages = vec![Message::user().with_text("Find verses about patience")];
        let tools = crate::tools::QuranTool::definitions();
        let (message, _) = provider
            .complete("You are a helpful assistant.", &messages, &tools)
            .await
            .unwrap();

        let request = message
            .content
            .iter()
            .find_map(MessageContent::as_tool_request)
            .expect("expected a tool request");
        let call = request.tool_call.as_ref().unwrap();
        assert_eq!(call.name, "search_verse");
        assert_eq!(call.arguments, json!({"query": "patience"}));
    }

    #[tokio::test]
    async fn test_rate_limit_vs_quota_classification() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string(
                r#"{"error": {"code": "insufficient_quota", "message": "Quota exceeded"}}"#,
            ))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string(
                r#"{"error": {"code": "rate_limit_exceeded", "message": "Slow down"}}"#,
            ))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let messages = vec![Message::user().with_text("Salam")];

        let err = provider.complete("sys", &messages, &[]).await.unwrap_err();
        assert_eq!(err, ProviderError::QuotaExhausted);

        let err = provider.complete("sys", &messages, &[]).await.unwrap_err();
        assert_eq!(err, ProviderError::RateLimited);
    }

    #[tokio::test]
    async fn test_forbidden_classification() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let err = provider
            .complete("sys", &[Message::user().with_text("hi")], &[])
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::Forbidden);
    }

    #[tokio::test]
    async fn test_generate_image_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/images/generations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"b64_json": "aGVsbG8="}]
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let uri = provider.generate_image("a geometric pattern").await.unwrap();
        assert_eq!(uri, "data:image/png;base64,aGVsbG8=");
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_image_refusal_is_retried_once_then_hard_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/images/generations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"revised_prompt": "cannot generate that"}]
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let err = provider.generate_image("a theme").await.unwrap_err();
        assert_eq!(err, ProviderError::Refused);
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_image_refusal_recovers_on_the_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/images/generations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/images/generations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"b64_json": "aW1n"}]
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let uri = provider.generate_image("a theme").await.unwrap();
        assert_eq!(uri, "data:image/png;base64,aW1n");
    }
}
