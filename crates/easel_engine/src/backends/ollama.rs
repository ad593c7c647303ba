//! Local Ollama backend.
//!
//! Talks to the Ollama chat API with JSON-format output and a
//! `keep_alive` knob so the model stays loaded between requests.

use crate::backend::GenerativeBackend;
use crate::backends::{annotate_metadata, map_status_error, map_transport_error, parse_reply};
use async_trait::async_trait;
use easel_common::{BackendCallError, CandidateResponse, OllamaConfig, QueryContext};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const OLLAMA_BACKEND_NAME: &str = "ollama";

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keep_alive: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
    #[serde(default)]
    eval_count: Option<u64>,
}

pub struct OllamaBackend {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    keep_alive: String,
    timeout_secs: u64,
}

impl OllamaBackend {
    pub fn new(config: &OllamaConfig, timeout_secs: u64) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            keep_alive: config.keep_alive.clone(),
            timeout_secs,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl GenerativeBackend for OllamaBackend {
    fn name(&self) -> &str {
        OLLAMA_BACKEND_NAME
    }

    async fn process_query(
        &self,
        message: &str,
        _context: &QueryContext,
        system_prompt: &str,
    ) -> Result<CandidateResponse, BackendCallError> {
        let url = format!("{}/api/chat", self.endpoint);
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: message.to_string(),
                },
            ],
            stream: false,
            format: Some("json".to_string()),
            keep_alive: Some(self.keep_alive.clone()),
        };

        debug!(
            "[>] ollama call model={} keep_alive={}",
            self.model, self.keep_alive
        );

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_transport_error(e, self.timeout_secs))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(map_status_error(status, body));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| BackendCallError::Http(format!("invalid chat response: {}", e)))?;

        if chat.message.content.trim().is_empty() {
            return Err(BackendCallError::EmptyResponse);
        }

        let mut candidate = parse_reply(&chat.message.content, OLLAMA_BACKEND_NAME);
        annotate_metadata(&mut candidate, &self.model, chat.eval_count);
        Ok(candidate)
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.endpoint);
        match self.http.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let config = OllamaConfig {
            endpoint: "http://127.0.0.1:11434/".to_string(),
            ..Default::default()
        };
        let backend = OllamaBackend::new(&config, 12);
        assert_eq!(backend.endpoint, "http://127.0.0.1:11434");
        assert_eq!(backend.name(), "ollama");
    }

    #[test]
    fn test_chat_request_serialization() {
        let request = ChatRequest {
            model: "qwen3:8b".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            stream: false,
            format: Some("json".to_string()),
            keep_alive: Some("5m".to_string()),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"format\":\"json\""));
        assert!(json.contains("\"keep_alive\":\"5m\""));
    }
}
