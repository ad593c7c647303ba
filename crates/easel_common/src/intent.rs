//! Keyword-driven intent extraction.
//!
//! Classifies a finished conversational turn (user message + backend
//! reply) into an actionable intent: an action verb, detected component
//! types, a keyword set, tutorial search topics, and a bounded
//! confidence score. A fixed, auditable heuristic - no trained model,
//! no LLM call.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The fixed action vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentAction {
    Create,
    Show,
    Learn,
    Analyze,
    Modify,
}

impl IntentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Show => "show",
            Self::Learn => "learn",
            Self::Analyze => "analyze",
            Self::Modify => "modify",
        }
    }
}

impl std::fmt::Display for IntentAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured classification of one turn. Derived fresh per turn and
/// never persisted by this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedIntent {
    pub action: Option<IntentAction>,
    pub component_types: Vec<String>,
    pub keywords: Vec<String>,
    pub tutorial_topics: Vec<String>,
    pub is_question: bool,
    pub needs_guidance: bool,
    /// Heuristic strength indicator in [0, 1]. Not a probability.
    pub confidence: f64,
}

/// Ordered action table; table order is the tie-break, so creation
/// intent wins over display intent when both match.
const ACTION_TABLE: &[(IntentAction, &[&str])] = &[
    (
        IntentAction::Create,
        &["create", "make", "build", "add", "design", "draw"],
    ),
    (IntentAction::Show, &["show", "display", "view", "see"]),
    (
        IntentAction::Learn,
        &["learn", "teach", "tutorial", "guide", "how to"],
    ),
    (
        IntentAction::Analyze,
        &["analyze", "review", "check", "inspect", "audit"],
    ),
    (
        IntentAction::Modify,
        &["change", "modify", "update", "edit", "adjust", "resize"],
    ),
];

/// Component-type tags and the keywords that detect them. Multiple types
/// may be detected in one turn.
const COMPONENT_TABLE: &[(&str, &[&str])] = &[
    ("button", &["button", "btn", "cta"]),
    ("card", &["card", "tile"]),
    ("input", &["input", "text field", "textfield"]),
    ("toggle", &["toggle", "switch"]),
    ("modal", &["modal", "dialog", "popup"]),
    ("form", &["form", "signup", "login"]),
    ("navbar", &["navbar", "navigation bar", "nav bar", "menu bar"]),
    ("dropdown", &["dropdown", "select menu"]),
    ("checkbox", &["checkbox"]),
    ("slider", &["slider", "range control"]),
];

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "what", "how", "can", "you", "your", "please",
    "would", "could", "should", "about", "have", "want", "need", "from", "into", "just", "like",
    "some", "them", "they", "will", "does", "did", "are", "was", "were", "there", "here", "when",
    "where", "why", "which", "who", "its", "get", "got", "let", "lets", "able",
];

const INTERROGATIVES: &[&str] = &[
    "how", "what", "why", "where", "when", "which", "who", "can", "should", "does",
];

const GUIDANCE_MARKERS: &[&str] = &["help", "guide", "don't know", "dont know", "confused"];

const TUTORIAL_MARKERS: &[&str] = &["tutorial", "how to"];

/// Confidence weights. Clamped to [0, 1] after summation.
const ACTION_WEIGHT: f64 = 0.3;
const COMPONENT_WEIGHT: f64 = 0.3;
const KEYWORD_WEIGHT: f64 = 0.2;

/// Keyword extractor and intent classifier with compiled topic patterns.
pub struct IntentExtractor {
    topic_patterns: Vec<Regex>,
}

impl IntentExtractor {
    pub fn new() -> Self {
        // Ordered: the first pattern yielding a non-empty capture wins.
        let patterns = [
            r"(?:tutorial|guide|teach|learn)\s+(?:me\s+)?(?:about\s+|on\s+|for\s+)?(.+)",
            r"show\s+me\s+how\s+to\s+(.+)",
            r"how\s+to\s+(.+)",
            r"help(?:\s+me)?(?:\s+with)?\s+(.+)",
        ];
        Self {
            topic_patterns: patterns
                .iter()
                .map(|p| Regex::new(p).expect("static topic pattern"))
                .collect(),
        }
    }

    /// Classify one turn. Action, component, and keyword detection run
    /// over the lower-cased concatenation of both texts; tutorial topics
    /// come from the user message only.
    pub fn classify(&self, user_message: &str, backend_text: &str) -> ParsedIntent {
        let message = user_message.to_lowercase();
        let combined = format!("{} {}", message, backend_text.to_lowercase());

        let (action, action_confidence) = detect_action(&combined);
        let component_types = detect_components(&combined);
        let keywords = extract_keywords(&combined);
        let tutorial_topics = self.extract_tutorial_topics(&message, &component_types);
        let is_question = detect_question(&message);
        let needs_guidance =
            is_question || GUIDANCE_MARKERS.iter().any(|m| message.contains(m));

        let mut confidence = 0.0;
        if action.is_some() {
            confidence += ACTION_WEIGHT * action_confidence;
        }
        if !component_types.is_empty() {
            confidence += COMPONENT_WEIGHT;
        }
        if keywords.len() > 5 {
            confidence += KEYWORD_WEIGHT;
        }
        if keywords.len() > 10 {
            confidence += KEYWORD_WEIGHT;
        }

        ParsedIntent {
            action,
            component_types,
            keywords,
            tutorial_topics,
            is_question,
            needs_guidance,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Run the ordered topic patterns over the user message; fall back to
    /// "<component> in Easel" when a tutorial marker is present but no
    /// pattern captured a topic.
    fn extract_tutorial_topics(&self, message: &str, components: &[String]) -> Vec<String> {
        for pattern in &self.topic_patterns {
            if let Some(caps) = pattern.captures(message) {
                if let Some(raw) = caps.get(1) {
                    let topic = clean_topic(raw.as_str());
                    if !topic.is_empty() {
                        return vec![topic];
                    }
                }
            }
        }

        let wants_tutorial = TUTORIAL_MARKERS.iter().any(|m| message.contains(m));
        if wants_tutorial {
            if let Some(first) = components.first() {
                return vec![format!("{} in Easel", first)];
            }
        }

        Vec::new()
    }
}

impl Default for IntentExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// First action whose verb list has any substring match wins; the match
/// fraction (matches / list size) is the per-action confidence.
fn detect_action(combined: &str) -> (Option<IntentAction>, f64) {
    for (action, verbs) in ACTION_TABLE {
        let matches = verbs.iter().filter(|v| combined.contains(**v)).count();
        if matches > 0 {
            return (Some(*action), matches as f64 / verbs.len() as f64);
        }
    }
    (None, 0.0)
}

fn detect_components(combined: &str) -> Vec<String> {
    COMPONENT_TABLE
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| combined.contains(k)))
        .map(|(tag, _)| tag.to_string())
        .collect()
}

/// Tokenize on non-word boundaries, drop short tokens and stopwords,
/// dedupe preserving first-seen order.
fn extract_keywords(combined: &str) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut keywords = Vec::new();

    for token in combined.split(|c: char| !c.is_alphanumeric()) {
        if token.len() <= 2 || STOPWORDS.contains(&token) {
            continue;
        }
        if seen.insert(token) {
            keywords.push(token.to_string());
        }
    }

    keywords
}

fn detect_question(message: &str) -> bool {
    if message.contains('?') {
        return true;
    }
    message
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| INTERROGATIVES.contains(&token))
}

/// Strip trailing punctuation and surrounding whitespace from a captured
/// topic.
fn clean_topic(raw: &str) -> String {
    raw.trim()
        .trim_end_matches(['?', '.', '!', ','])
        .trim()
        .to_string()
}
