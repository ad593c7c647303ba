//! Response validation heuristics.
//!
//! A deterministic, auditable rule set judging whether a backend reply
//! is usable, distinct from semantic correctness. Checks run in a fixed
//! order and short-circuit on the first failure; the verdict's hint is
//! fed back into the next retry's prompt.

use crate::error::ValidationError;
use crate::types::CandidateResponse;

/// Minimum trimmed response length considered non-trivial.
const MIN_RESPONSE_CHARS: usize = 10;

/// A reply containing both an apology marker and an error marker is a
/// backend narrating its own failure, not an answer.
const APOLOGY_MARKERS: &[&str] = &["sorry", "apolog"];
const ERROR_MARKERS: &[&str] = &["error", "failed", "cannot process", "unable to process"];

/// Creation verbs that, combined with a component noun, mark a
/// component-creation request.
const CREATION_VERBS: &[&str] = &["create", "make", "build", "show", "add", "design"];

/// Component vocabulary shared with the intent extractor's type tags.
pub const COMPONENT_NOUNS: &[&str] = &[
    "button", "card", "input", "toggle", "modal", "form", "navbar", "dropdown", "checkbox",
    "slider", "avatar", "badge", "tooltip",
];

const TUTORIAL_MARKERS: &[&str] = &["tutorial", "how to"];

/// Outcome of validating one candidate response.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationVerdict {
    pub is_valid: bool,
    pub error: Option<ValidationError>,
    /// Human-readable correction used to steer the next retry's prompt.
    pub hint: Option<String>,
}

impl ValidationVerdict {
    fn valid() -> Self {
        Self {
            is_valid: true,
            error: None,
            hint: None,
        }
    }

    fn invalid(error: ValidationError, hint: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error: Some(error),
            hint: Some(hint.into()),
        }
    }
}

/// Judge a candidate against the original user message.
///
/// Pure function: identical inputs always yield identical verdicts.
pub fn validate(candidate: &CandidateResponse, original_message: &str) -> ValidationVerdict {
    // A metadata block that existed but failed schema parsing is fed
    // into the same retry path as any other rejection.
    let metadata = match &candidate.metadata {
        Some(m) => m,
        None => {
            return ValidationVerdict::invalid(
                ValidationError::ParseError,
                "emit the structured metadata block as a single valid JSON object",
            )
        }
    };

    // 1. Non-triviality.
    if candidate.text.trim().len() < MIN_RESPONSE_CHARS {
        return ValidationVerdict::invalid(
            ValidationError::TooShort,
            "give a fuller answer with at least one complete sentence",
        );
    }

    // 2. Self-referential failure text.
    let text = candidate.text.to_lowercase();
    let apologizes = APOLOGY_MARKERS.iter().any(|m| text.contains(m));
    let mentions_error = ERROR_MARKERS.iter().any(|m| text.contains(m));
    if apologizes && mentions_error {
        return ValidationVerdict::invalid(
            ValidationError::ContainsErrorLanguage,
            "answer the design question directly instead of reporting an internal failure",
        );
    }

    let message = original_message.to_lowercase();

    // 3. Component-intent completeness.
    let wants_component = CREATION_VERBS.iter().any(|v| message.contains(v))
        && COMPONENT_NOUNS.iter().any(|n| message.contains(n));
    if wants_component && (metadata.action.is_none() || metadata.component_type.is_none()) {
        return ValidationVerdict::invalid(
            ValidationError::MissingComponentMetadata,
            "include both an action and a componentType field in the metadata",
        );
    }

    // 4. Tutorial-intent completeness.
    let wants_tutorial = TUTORIAL_MARKERS.iter().any(|m| message.contains(m));
    if wants_tutorial && metadata.tutorials.is_empty() {
        return ValidationVerdict::invalid(
            ValidationError::MissingTutorials,
            "include at least one tutorial suggestion in the metadata",
        );
    }

    ValidationVerdict::valid()
}
