//! Core data model for one orchestration call.
//!
//! A `QueryContext` is owned by exactly one in-flight call; the only
//! mid-flight mutation the orchestrator performs on it is the retry
//! annotation (`enhanced_prompt` + `validation_hint`). Attempt records
//! are append-only and travel with the final response as an audit trail.

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provider name carried by a synthesized terminal apology response.
pub const ERROR_PROVIDER: &str = "error";

/// User skill level, used to pick the system prompt variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl SkillLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

impl Default for SkillLevel {
    fn default() -> Self {
        Self::Beginner
    }
}

impl std::fmt::Display for SkillLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-call context supplied by the caller and annotated by the
/// orchestrator between retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryContext {
    /// Correlation id for this orchestration call, generated at
    /// construction. Volatile: excluded from cache keys.
    #[serde(default = "new_query_id")]
    pub query_id: String,

    /// The user's message, verbatim.
    pub message: String,

    /// Session/conversation metadata. Volatile: excluded from cache keys.
    pub session_id: Option<String>,
    pub conversation_id: Option<String>,
    pub caller_id: Option<String>,

    /// Wall-clock start of the orchestration call.
    pub started_at: DateTime<Utc>,

    pub skill_level: SkillLevel,

    /// Set by the orchestrator after a rejected attempt so the next
    /// prompt can self-correct. The only mid-flight context mutation.
    #[serde(default)]
    pub enhanced_prompt: bool,
    #[serde(default)]
    pub validation_hint: Option<String>,
}

impl QueryContext {
    pub fn new(message: impl Into<String>, skill_level: SkillLevel) -> Self {
        Self {
            query_id: new_query_id(),
            message: message.into(),
            session_id: None,
            conversation_id: None,
            caller_id: None,
            started_at: Utc::now(),
            skill_level,
            enhanced_prompt: false,
            validation_hint: None,
        }
    }

    /// Builder-style session metadata, handy for callers and tests.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_caller(mut self, caller_id: impl Into<String>) -> Self {
        self.caller_id = Some(caller_id.into());
        self
    }

    /// Record a validation hint for the next retry's prompt.
    pub fn apply_validation_hint(&mut self, hint: Option<String>) {
        self.enhanced_prompt = true;
        self.validation_hint = hint;
    }

    /// Drop retry annotations. The fallback cascade gives each backend
    /// one clean attempt without the primary's accumulated hint.
    pub fn clear_retry_annotations(&mut self) {
        self.enhanced_prompt = false;
        self.validation_hint = None;
    }
}

fn new_query_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// One backend call during one orchestration, recorded regardless of
/// outcome. Appended, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttemptRecord {
    pub backend: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_error: Option<String>,
}

impl AttemptRecord {
    pub fn succeeded(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            success: true,
            error: None,
            validation_error: None,
        }
    }

    pub fn failed(backend: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            success: false,
            error: Some(error.into()),
            validation_error: None,
        }
    }

    pub fn rejected(backend: impl Into<String>, validation_error: ValidationError) -> Self {
        Self {
            backend: backend.into(),
            success: false,
            error: None,
            validation_error: Some(validation_error.code().to_string()),
        }
    }
}

/// Structured metadata parsed out of a backend reply.
///
/// This is the schema-validated intermediate type: unknown fields are
/// ignored, missing fields default, and a reply whose metadata block
/// fails to parse at all is distinguishable (see `CandidateResponse`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub action: Option<String>,
    pub component_type: Option<String>,
    pub teacher_note: Option<String>,
    pub suggestions: Vec<String>,
    pub tutorials: Vec<String>,
    pub components: Vec<String>,
    pub guidance: Vec<String>,
    pub tokens_used: Option<u64>,
    pub cost_usd: Option<f64>,
    pub model: Option<String>,
}

impl ResponseMetadata {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// A single backend's reply, before validation.
///
/// `metadata == None` means the backend emitted a metadata block that
/// failed schema parsing; the validator turns that into `ParseError`
/// on the normal retry path. A reply with no block at all parses to
/// `Some(ResponseMetadata::default())`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResponse {
    pub text: String,
    pub metadata: Option<ResponseMetadata>,
    pub provider: String,
}

impl CandidateResponse {
    pub fn new(
        text: impl Into<String>,
        metadata: ResponseMetadata,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            metadata: Some(metadata),
            provider: provider.into(),
        }
    }

    /// A reply whose structured block could not be parsed.
    pub fn unparsed(text: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: None,
            provider: provider.into(),
        }
    }
}

/// What the caller always receives: exactly one per orchestration call,
/// either an accepted candidate or a synthesized apology with
/// `provider == "error"`. There is no error exit path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalResponse {
    pub text: String,
    pub metadata: ResponseMetadata,
    pub provider: String,
    pub attempts: Vec<AttemptRecord>,
    /// Last backend/validation error seen, only on the apology path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FinalResponse {
    /// Wrap an accepted candidate together with its attempt log.
    pub fn accepted(candidate: CandidateResponse, attempts: Vec<AttemptRecord>) -> Self {
        Self {
            text: candidate.text,
            metadata: candidate.metadata.unwrap_or_default(),
            provider: candidate.provider,
            attempts,
            error: None,
        }
    }

    /// Terminal apology after every backend was exhausted. Generic text,
    /// never a raw error string, never empty.
    pub fn all_failed(attempts: Vec<AttemptRecord>, last_error: Option<String>) -> Self {
        Self {
            text: "I'm sorry - the Easel assistant is temporarily unavailable. \
                   Please try again in a moment."
                .to_string(),
            metadata: ResponseMetadata::default(),
            provider: ERROR_PROVIDER.to_string(),
            attempts,
            error: last_error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.provider == ERROR_PROVIDER
    }
}

/// Catalog entry returned by the component catalog collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComponentSummary {
    pub id: String,
    pub name: String,
    pub component_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Search hit returned by the video tutorial collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TutorialSummary {
    pub title: String,
    pub url: String,
    pub topic: String,
}

/// A pending video search, packaged by the enrichment pipeline and
/// executed by the external search service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TutorialRequest {
    pub topic: String,
    pub max_results: usize,
}

/// One step of the deterministic guidance template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuidanceStep {
    pub step: u8,
    pub title: String,
    pub detail: String,
}
