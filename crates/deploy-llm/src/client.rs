use crate::types::{ChatMessage, LlmTurn, ToolSchema};
use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct LlmCallError(pub String);

/// Normalizes divergent provider client shapes into one surface (spec.md
/// §9 design note: "two LLM client libraries with divergent shapes →
/// adapter pair behind the Broker"). Grounded on
/// `agent-llm::provider::LLMProvider`.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn send(&self, history: &[ChatMessage], tools: &[ToolSchema]) -> Result<LlmTurn, LlmCallError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: &'a [ChatMessage],
    tools: &'a [ToolSchema],
}

/// A typed client against a single function-calling-capable chat endpoint
/// (spec.md §6: the LLM service is an external black box, "a message/
/// function-call endpoint"). Used for both the primary and backup
/// endpoints — they're distinguished only by `api_base`/`api_key` at
/// construction, grounded on `copilot_client::api::client::CopilotClient`'s
/// single-struct-two-instances pattern (one per credential).
pub struct HttpLlmClient {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl HttpLlmClient {
    pub fn new(client: reqwest::Client, api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn send(&self, history: &[ChatMessage], tools: &[ToolSchema]) -> Result<LlmTurn, LlmCallError> {
        let response = self
            .client
            .post(format!("{}/chat", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&ChatRequest { messages: history, tools })
            .send()
            .await
            .map_err(|err| LlmCallError(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmCallError(format!("{status}: {body}")));
        }

        response.json::<LlmTurn>().await.map_err(|err| LlmCallError(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn deserializes_a_text_turn() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"Text": "hello"})))
            .mount(&server)
            .await;

        let client = HttpLlmClient::new(reqwest::Client::new(), server.uri(), "key");
        let turn = client.send(&[ChatMessage::user("hi")], &[]).await.unwrap();
        assert!(matches!(turn, LlmTurn::Text(t) if t == "hello"));
    }

    #[tokio::test]
    async fn surfaces_non_success_status_as_call_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limit"))
            .mount(&server)
            .await;

        let client = HttpLlmClient::new(reqwest::Client::new(), server.uri(), "key");
        let err = client.send(&[ChatMessage::user("hi")], &[]).await.unwrap_err();
        assert!(err.0.contains("429"));
    }
}
