//! Anthropic Messages API client (https://api.anthropic.com by default).
//! Non-streaming only: the relay needs the first text block of each reply.

use serde::{Deserialize, Serialize};

use crate::config::CompletionConfig;
use crate::conversation::Role;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const PROBE_MESSAGE: &str = "Teste";
const PROBE_MAX_TOKENS: u32 = 50;

/// Client for the Messages API. Cheap to clone (shares the HTTP connection pool).
#[derive(Clone)]
pub struct AnthropicClient {
    base_url: String,
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
}

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("completion api key not configured")]
    MissingApiKey,
    #[error("completion request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("completion api error: {status} {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("completion response malformed: {0}")]
    MalformedResponse(String),
}

/// One prompt message (user or assistant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Everything one completion call needs besides credentials.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

impl AnthropicClient {
    pub fn new(
        base_url: Option<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            api_key,
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &CompletionConfig) -> Self {
        Self::new(
            Some(config.base_url.clone()),
            config.api_key.clone(),
            config.model.clone(),
        )
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// POST /v1/messages returns the text of the first content block.
    pub async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(CompletionError::MissingApiKey)?;
        let url = format!("{}/v1/messages", self.base_url);
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            system: (!request.system.trim().is_empty()).then_some(request.system.as_str()),
            messages: &request.messages,
        };
        let res = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(CompletionError::Api { status, body });
        }
        let data: MessagesResponse = res
            .json()
            .await
            .map_err(|e| CompletionError::MalformedResponse(e.to_string()))?;
        data.first_text()
    }

    /// Minimal request used at startup to prove the key and model work.
    pub async fn probe(&self) -> Result<(), CompletionError> {
        let request = CompletionRequest {
            system: String::new(),
            messages: vec![ChatMessage {
                role: Role::User,
                content: PROBE_MESSAGE.to_string(),
            }],
            max_tokens: PROBE_MAX_TOKENS,
        };
        self.complete(&request).await.map(|_| ())
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

impl MessagesResponse {
    fn first_text(self) -> Result<String, CompletionError> {
        match self.content.into_iter().next() {
            Some(ContentBlock::Text { text }) => Ok(text),
            Some(ContentBlock::Other) => Err(CompletionError::MalformedResponse(
                "first content block is not text".to_string(),
            )),
            None => Err(CompletionError::MalformedResponse(
                "response has no content blocks".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_body_puts_system_at_top_level() {
        let messages = vec![ChatMessage {
            role: Role::User,
            content: "Oi".to_string(),
        }];
        let body = MessagesRequest {
            model: "m",
            max_tokens: 150,
            system: Some("be nice"),
            messages: &messages,
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(
            v,
            json!({
                "model": "m",
                "max_tokens": 150,
                "system": "be nice",
                "messages": [{ "role": "user", "content": "Oi" }]
            })
        );
    }

    #[test]
    fn first_text_block_is_extracted() {
        let res: MessagesResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "content": [
                { "type": "text", "text": "Olá!" },
                { "type": "text", "text": "ignored" }
            ],
            "stop_reason": "end_turn"
        }))
        .unwrap();
        assert_eq!(res.first_text().unwrap(), "Olá!");
    }

    #[test]
    fn non_text_or_empty_content_is_malformed() {
        let res: MessagesResponse = serde_json::from_value(json!({
            "content": [{ "type": "tool_use", "id": "t", "name": "x", "input": {} }]
        }))
        .unwrap();
        assert!(matches!(
            res.first_text(),
            Err(CompletionError::MalformedResponse(_))
        ));
        let empty: MessagesResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(
            empty.first_text(),
            Err(CompletionError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn complete_without_key_fails_fast() {
        let client = AnthropicClient::new(Some("http://127.0.0.1:9".to_string()), None, "m");
        let err = client
            .complete(&CompletionRequest {
                system: String::new(),
                messages: Vec::new(),
                max_tokens: 1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::MissingApiKey));
    }
}
