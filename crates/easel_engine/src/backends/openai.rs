//! OpenAI-compatible remote backend.
//!
//! One implementation covers every hosted vendor exposing the
//! `/chat/completions` shape; the registry instantiates it per
//! configured remote with its own name, endpoint, model, and key.

use crate::backend::GenerativeBackend;
use crate::backends::{annotate_metadata, map_status_error, map_transport_error, parse_reply};
use async_trait::async_trait;
use easel_common::{BackendCallError, CandidateResponse, QueryContext, RemoteBackendConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: Option<u64>,
}

pub struct OpenAiCompatBackend {
    name: String,
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    timeout_secs: u64,
}

impl OpenAiCompatBackend {
    pub fn new(config: &RemoteBackendConfig, api_key: String, timeout_secs: u64) -> Self {
        Self {
            name: config.name.clone(),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            timeout_secs,
        }
    }
}

#[async_trait]
impl GenerativeBackend for OpenAiCompatBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process_query(
        &self,
        message: &str,
        _context: &QueryContext,
        system_prompt: &str,
    ) -> Result<CandidateResponse, BackendCallError> {
        let url = format!("{}/chat/completions", self.endpoint);
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
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        debug!("[>] {} call model={}", self.name, self.model);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_transport_error(e, self.timeout_secs))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(map_status_error(status, body));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| BackendCallError::Http(format!("invalid completion response: {}", e)))?;

        let content = completion
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or("");

        if content.trim().is_empty() {
            return Err(BackendCallError::EmptyResponse);
        }

        let tokens = completion.usage.as_ref().and_then(|u| u.total_tokens);
        let mut candidate = parse_reply(content, &self.name);
        annotate_metadata(&mut candidate, &self.model, tokens);
        Ok(candidate)
    }
}
