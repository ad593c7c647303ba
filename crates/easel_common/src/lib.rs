//! Shared types and pure logic for the Easel assistant.
//!
//! Everything in this crate is deterministic and free of I/O: the data
//! model exchanged between the orchestrator and its collaborators, the
//! response validator, the keyword-driven intent extractor, the
//! skill-aware system prompt builder, and engine configuration.

pub mod config;
pub mod error;
pub mod intent;
pub mod prompts;
pub mod types;
pub mod validator;

pub use config::{EngineConfig, OllamaConfig, RemoteBackendConfig};
pub use error::{BackendCallError, ValidationError};
pub use intent::{IntentAction, IntentExtractor, ParsedIntent};
pub use prompts::build_system_prompt;
pub use types::{
    AttemptRecord, CandidateResponse, ComponentSummary, FinalResponse, GuidanceStep,
    QueryContext, ResponseMetadata, SkillLevel, TutorialRequest, TutorialSummary,
    ERROR_PROVIDER,
};
pub use validator::{validate, ValidationVerdict};
