//! Anthropic Messages API client.

use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::{Credential, LlmConfig};
use crate::error::{AiError, Result};

/// Value sent in the `anthropic-version` header.
pub const API_VERSION: &str = "2023-06-01";

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Single-turn client for `POST {base_url}/v1/messages`.
#[derive(Clone)]
pub struct AnthropicClient {
    client: Client,
    config: LlmConfig,
    credential: Credential,
}

impl AnthropicClient {
    /// Create a client.
    pub fn new(config: LlmConfig, credential: Credential) -> Result<Self> {
        let client = ClientBuilder::new().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            config,
            credential,
        })
    }

    /// Current configuration.
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Send one user message and return the concatenated reply text.
    pub async fn complete(&self, system: &str, prompt: &str, timeout: Duration) -> Result<String> {
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };

        debug!(
            model = %self.config.model,
            prompt_chars = prompt.len(),
            timeout_secs = timeout.as_secs(),
            "calling messages api"
        );

        let response = self
            .client
            .post(self.config.endpoint())
            .header("x-api-key", self.credential.expose())
            .header("anthropic-version", API_VERSION)
            .timeout(timeout)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(AiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let reply: MessagesResponse = response.json().await?;
        let text: String = reply
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if text.trim().is_empty() {
            return Err(AiError::EmptyResponse);
        }
        Ok(text)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) fn text_reply(text: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "content": [
                { "type": "text", "text": text },
                { "type": "tool_use", "id": "t1", "name": "noop", "input": {} }
            ],
            "stop_reason": "end_turn"
        })
    }

    /// Mount a Messages API endpoint that answers every matching request with `response`.
    pub(crate) async fn messages_api(response: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-test"))
            .and(header("anthropic-version", API_VERSION))
            .respond_with(response)
            .mount(&server)
            .await;
        server
    }

    /// JSON body of the only request the server received.
    pub(crate) async fn sent_body(server: &MockServer) -> serde_json::Value {
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        serde_json::from_slice(&requests[0].body).unwrap()
    }

    pub(crate) fn client(base_url: String) -> AnthropicClient {
        let config = LlmConfig::default().with_base_url(base_url);
        AnthropicClient::new(config, Credential::new("sk-test").unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_request_shape_and_reply_text() {
        let server = messages_api(ResponseTemplate::new(200).set_body_json(text_reply("implemented"))).await;

        let reply = client(server.uri())
            .complete("be terse", "build it", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(reply, "implemented");

        let body = sent_body(&server).await;
        assert_eq!(body["model"], "claude-3-5-sonnet-20241022");
        assert_eq!(body["max_tokens"], 8192);
        assert_eq!(body["system"], "be terse");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "build it");
    }

    #[tokio::test]
    async fn test_api_error_message_is_surfaced() {
        let body = serde_json::json!({
            "type": "error",
            "error": { "type": "overloaded_error", "message": "Overloaded" }
        });
        let server = messages_api(ResponseTemplate::new(529).set_body_json(body)).await;

        let err = client(server.uri())
            .complete("s", "p", Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            AiError::Api { status, message } => {
                assert_eq!(status, 529);
                assert_eq!(message, "Overloaded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_unparsed_error_body_is_kept_raw() {
        let server = messages_api(ResponseTemplate::new(502).set_body_string("bad gateway")).await;

        let err = client(server.uri())
            .complete("s", "p", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Api { status: 502, message } if message == "bad gateway"));
    }

    #[tokio::test]
    async fn test_reply_without_text_is_an_error() {
        let server =
            messages_api(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "content": [] }))).await;

        let err = client(server.uri())
            .complete("s", "p", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let server = messages_api(
            ResponseTemplate::new(200)
                .set_body_json(text_reply("late"))
                .set_delay(Duration::from_secs(5)),
        )
        .await;

        let err = client(server.uri())
            .complete("s", "p", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }
}
