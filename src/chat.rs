//! Chat model gateway abstraction and HTTP implementation.
//!
//! The gateway takes the full message history and returns one assistant
//! reply. Failures are split into [`EngineError::ModelTimeout`] and
//! [`EngineError::ModelUnavailable`] so callers can degrade differently;
//! the query pipeline turns both into a bracketed error answer instead of
//! dropping the turn.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::ChatConfig;
use crate::error::EngineError;
use crate::models::ChatMessage;

#[async_trait]
pub trait ChatModelGateway: Send + Sync {
    /// Complete the conversation, returning the assistant's reply text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, EngineError>;
}

/// Gateway to an OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct HttpChatGateway {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
}

impl HttpChatGateway {
    pub fn new(config: &ChatConfig) -> Result<Self, EngineError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| EngineError::ModelUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl ChatModelGateway for HttpChatGateway {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, EngineError> {
        let url = format!("{}/v1/chat/completions", self.endpoint);
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "stream": false,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EngineError::ModelTimeout(e.to_string())
                } else {
                    EngineError::ModelUnavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(EngineError::ModelUnavailable(format!(
                "HTTP {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| EngineError::ModelUnavailable(format!("invalid response: {}", e)))?;

        extract_reply(&json)
    }
}

/// Pull `choices[0].message.content` out of a chat completions response.
fn extract_reply(json: &serde_json::Value) -> Result<String, EngineError> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            EngineError::ModelUnavailable("response missing choices[0].message.content".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_reply() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "hello"}}]
        });
        assert_eq!(extract_reply(&json).unwrap(), "hello");
    }

    #[test]
    fn test_extract_reply_missing_content() {
        let json = serde_json::json!({"choices": [{"message": {"role": "assistant"}}]});
        assert!(matches!(
            extract_reply(&json),
            Err(EngineError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_extract_reply_empty_choices() {
        let json = serde_json::json!({"choices": []});
        assert!(extract_reply(&json).is_err());
    }
}
