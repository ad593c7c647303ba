//! Easel assistant engine.
//!
//! The orchestration layer around interchangeable generative backends:
//! backend registry and selection, validation-driven retry with
//! corrective hints, multi-backend fallback cascade, response caching,
//! intent-driven enrichment, and best-effort usage logging.
//!
//! The entry point is [`orchestrator::QueryOrchestrator::process_query`],
//! which never fails: callers always receive a well-formed
//! `FinalResponse`, including the full-exhaustion apology case.

pub mod backend;
pub mod backends;
pub mod cache;
pub mod enrichment;
pub mod orchestrator;
pub mod testing;
pub mod usage;

pub use backend::{BackendRegistry, GenerativeBackend};
pub use cache::{CacheStore, InMemoryCacheStore, ResponseCache};
pub use enrichment::{ComponentCatalog, EnrichmentPipeline, EnrichmentResult, TutorialSearch};
pub use orchestrator::QueryOrchestrator;
pub use usage::{TracingUsageLogger, UsageLogger};
