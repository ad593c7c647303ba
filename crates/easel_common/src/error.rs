//! Error types shared across the assistant engine.
//!
//! The propagation policy is strict: every failure below the
//! orchestration entry point resolves into a retry, a cascade step, or a
//! synthesized terminal response. These enums are the vocabulary for
//! that resolution, not exceptions that cross the boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a single generative backend call.
///
/// Transport, auth, and quota failures are all treated the same way by
/// the orchestrator: one failed attempt, then retry or cascade.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendCallError {
    #[error("backend call timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("quota exhausted: {0}")]
    Quota(String),

    #[error("backend returned an empty response")]
    EmptyResponse,

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Why a candidate response was rejected by the validator.
///
/// These drive the retry-hint mechanism; they are structured feedback,
/// not hard errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum ValidationError {
    #[error("response text is too short to be useful")]
    TooShort,

    #[error("response reports a backend-side failure instead of answering")]
    ContainsErrorLanguage,

    #[error("component request is missing action/componentType metadata")]
    MissingComponentMetadata,

    #[error("tutorial request carries no tutorial suggestions")]
    MissingTutorials,

    #[error("backend output could not be parsed as structured metadata")]
    ParseError,
}

impl ValidationError {
    /// Stable code string recorded in attempt logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::TooShort => "too_short",
            Self::ContainsErrorLanguage => "contains_error_language",
            Self::MissingComponentMetadata => "missing_component_metadata",
            Self::MissingTutorials => "missing_tutorials",
            Self::ParseError => "parse_error",
        }
    }
}
