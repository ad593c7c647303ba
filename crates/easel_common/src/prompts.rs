//! System prompt builder.
//!
//! A pure function of the query context: the skill level picks the base
//! instruction text, and a validation hint from a rejected attempt is
//! appended so the next call can self-correct. Treated as configuration
//! input by the orchestrator, not part of its contract.

use crate::types::{QueryContext, SkillLevel};

const PROMPT_COMMON: &str = "\
You are the Easel assistant, helping users design interfaces on the Easel canvas.
Reply with a single JSON object containing:
  \"message\": your answer to the user,
  \"action\": one of create/show/learn/analyze/modify when the user asks for one,
  \"componentType\": the UI component involved (button, card, input, toggle, modal, form, navbar, ...),
  \"tutorials\": suggested tutorial titles when the user asks how to do something,
  \"suggestions\": short follow-up ideas,
  \"teacherNote\": an optional coaching note.
Omit fields that do not apply. Never report internal errors; answer the design question.";

const PROMPT_BEGINNER: &str = "\
The user is new to design tools. Explain one concept at a time in plain words,
avoid jargon, and spell out where to click on the canvas.";

const PROMPT_INTERMEDIATE: &str = "\
The user knows the basics. Be concise, name the exact panels and shortcuts,
and mention one deeper technique when relevant.";

const PROMPT_ADVANCED: &str = "\
The user is an experienced designer. Skip fundamentals, focus on systems:
variants, tokens, constraints, and scalable component structure.";

/// Build the instruction text for one backend attempt.
pub fn build_system_prompt(context: &QueryContext) -> String {
    let skill = match context.skill_level {
        SkillLevel::Beginner => PROMPT_BEGINNER,
        SkillLevel::Intermediate => PROMPT_INTERMEDIATE,
        SkillLevel::Advanced => PROMPT_ADVANCED,
    };

    let mut prompt = format!("{}\n\n{}", PROMPT_COMMON, skill);

    if context.enhanced_prompt {
        if let Some(hint) = &context.validation_hint {
            prompt.push_str(&format!(
                "\n\nYour previous reply was rejected: {}. Correct this in your reply.",
                hint
            ));
        }
    }

    prompt
}
