//! Concrete generative backends and shared reply parsing.
//!
//! Backends are asked (via the system prompt) to reply with one JSON
//! object carrying the answer text and structured metadata. Models do
//! not always comply, so parsing is salvage-oriented: extract the brace
//! slice, try the schema, and degrade without crashing. A block that
//! exists but fails the schema yields an unparsed candidate, which the
//! validator rejects as `ParseError` on the normal retry path.

mod ollama;
mod openai;

pub use ollama::OllamaBackend;
pub use openai::OpenAiCompatBackend;

use easel_common::{BackendCallError, CandidateResponse, ResponseMetadata};
use serde::Deserialize;

/// Wire shape of a compliant backend reply.
#[derive(Debug, Deserialize)]
struct BackendReply {
    #[serde(default)]
    message: String,
    #[serde(flatten)]
    metadata: ResponseMetadata,
}

/// Extract the JSON object from text that may have prose around it.
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}

/// Turn raw backend output into a candidate response.
///
/// - compliant JSON block: answer text + parsed metadata;
/// - no block at all: the whole reply is the answer, empty metadata;
/// - malformed block: unparsed candidate (validator: `ParseError`).
pub(crate) fn parse_reply(raw: &str, provider: &str) -> CandidateResponse {
    match extract_json(raw) {
        None => CandidateResponse::new(raw.trim(), ResponseMetadata::default(), provider),
        Some(block) => match serde_json::from_str::<BackendReply>(block) {
            Ok(reply) => CandidateResponse::new(reply.message, reply.metadata, provider),
            Err(e) => {
                tracing::warn!("Backend '{}' reply failed schema parse: {}", provider, e);
                CandidateResponse::unparsed(raw.trim(), provider)
            }
        },
    }
}

/// Fill bookkeeping fields the API layer knows better than the model.
pub(crate) fn annotate_metadata(
    candidate: &mut CandidateResponse,
    model: &str,
    tokens_used: Option<u64>,
) {
    if let Some(metadata) = candidate.metadata.as_mut() {
        metadata.model.get_or_insert_with(|| model.to_string());
        if metadata.tokens_used.is_none() {
            metadata.tokens_used = tokens_used;
        }
    }
}

/// Map a transport failure onto the backend error taxonomy.
pub(crate) fn map_transport_error(e: reqwest::Error, timeout_secs: u64) -> BackendCallError {
    if e.is_timeout() {
        BackendCallError::Timeout(timeout_secs)
    } else if e.is_connect() {
        BackendCallError::Unavailable(e.to_string())
    } else {
        BackendCallError::Http(e.to_string())
    }
}

/// Map a non-success HTTP status onto the backend error taxonomy.
pub(crate) fn map_status_error(status: reqwest::StatusCode, body: String) -> BackendCallError {
    match status.as_u16() {
        401 | 403 => BackendCallError::Auth(format!("{}: {}", status, body)),
        429 => BackendCallError::Quota(format!("{}: {}", status, body)),
        _ => BackendCallError::Http(format!("{}: {}", status, body)),
    }
}
