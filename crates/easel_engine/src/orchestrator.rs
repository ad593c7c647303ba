//! Query orchestrator.
//!
//! Drives one request through cache lookup, backend selection, the
//! validation-driven retry loop, and the fallback cascade. The contract
//! is strict: `process_query` always returns a well-formed
//! `FinalResponse` - an accepted candidate or a synthesized apology -
//! and nothing below this boundary raises past it.
//!
//! The retry loop and cascade are deliberately sequential: each
//! attempt's outcome decides whether the next is needed, and parallel
//! fan-out would multiply cost against paid backends.

use crate::backend::{BackendRegistry, GenerativeBackend};
use crate::cache::ResponseCache;
use crate::usage::{TracingUsageLogger, UsageLogger};
use easel_common::{
    build_system_prompt, validate, AttemptRecord, BackendCallError, CandidateResponse,
    EngineConfig, FinalResponse, QueryContext, ValidationVerdict,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Outcome of one backend attempt, after validation.
enum AttemptOutcome {
    Accepted(CandidateResponse),
    Rejected(ValidationVerdict),
    Failed(BackendCallError),
}

pub struct QueryOrchestrator {
    registry: Arc<BackendRegistry>,
    cache: ResponseCache,
    usage: Arc<dyn UsageLogger>,
    max_retries: usize,
    attempt_timeout: Duration,
}

impl QueryOrchestrator {
    pub fn new(
        registry: Arc<BackendRegistry>,
        cache: ResponseCache,
        usage: Arc<dyn UsageLogger>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            registry,
            cache,
            usage,
            max_retries: config.max_retries.max(1),
            attempt_timeout: Duration::from_secs(config.backend_timeout_secs),
        }
    }

    /// Production wiring: registry from config, in-memory cache,
    /// tracing usage sink.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            Arc::new(BackendRegistry::from_config(config)),
            ResponseCache::in_memory(config.cache_capacity, config.cache_ttl_secs),
            Arc::new(TracingUsageLogger),
            config,
        )
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Orchestrate one query. Never fails.
    pub async fn process_query(
        &self,
        message: &str,
        mut context: QueryContext,
        preferred_backend: Option<&str>,
    ) -> FinalResponse {
        debug!(
            query_id = %context.query_id,
            skill = %context.skill_level,
            "Processing query"
        );
        let cache_key = ResponseCache::cache_key(message, context.skill_level);

        if let Some(hit) = self.cache.get(&cache_key).await {
            info!(provider = %hit.provider, "Cache hit, skipping backends");
            return hit;
        }

        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut last_error: Option<String> = None;

        // Primary selection: preferred if registered, else the
        // configured default. An unregistered name is not fatal; the
        // cascade still runs.
        let primary = self.select_primary(preferred_backend);

        if let Some(backend) = &primary {
            for attempt_no in 1..=self.max_retries {
                debug!(
                    "Attempt {}/{} on primary backend '{}'",
                    attempt_no,
                    self.max_retries,
                    backend.name()
                );
                match self.run_attempt(backend.as_ref(), message, &context).await {
                    AttemptOutcome::Accepted(candidate) => {
                        attempts.push(AttemptRecord::succeeded(backend.name()));
                        return self
                            .accept(candidate, attempts, &cache_key, message, &context)
                            .await;
                    }
                    AttemptOutcome::Rejected(verdict) => {
                        if let Some(error) = verdict.error {
                            attempts.push(AttemptRecord::rejected(backend.name(), error));
                            last_error = Some(format!("validation failed: {}", error));
                        }
                        // The only mid-flight context mutation: the next
                        // prompt carries the validator's correction.
                        context.apply_validation_hint(verdict.hint);
                    }
                    AttemptOutcome::Failed(e) => {
                        warn!("Backend '{}' attempt failed: {}", backend.name(), e);
                        attempts.push(AttemptRecord::failed(backend.name(), e.to_string()));
                        last_error = Some(e.to_string());
                    }
                }
            }
            info!(
                "Primary backend '{}' exhausted after {} attempts, cascading",
                backend.name(),
                self.max_retries
            );
        }

        // Fallback cascade: every other backend gets exactly one clean
        // attempt, without the primary's accumulated hint.
        context.clear_retry_annotations();
        let primary_name = primary.as_ref().map(|b| b.name().to_string());
        for backend in self.registry.others(primary_name.as_deref().unwrap_or("")) {
            debug!("Cascade attempt on backend '{}'", backend.name());
            match self.run_attempt(backend.as_ref(), message, &context).await {
                AttemptOutcome::Accepted(candidate) => {
                    attempts.push(AttemptRecord::succeeded(backend.name()));
                    return self
                        .accept(candidate, attempts, &cache_key, message, &context)
                        .await;
                }
                AttemptOutcome::Rejected(verdict) => {
                    if let Some(error) = verdict.error {
                        attempts.push(AttemptRecord::rejected(backend.name(), error));
                        last_error = Some(format!("validation failed: {}", error));
                    }
                }
                AttemptOutcome::Failed(e) => {
                    warn!("Cascade backend '{}' failed: {}", backend.name(), e);
                    attempts.push(AttemptRecord::failed(backend.name(), e.to_string()));
                    last_error = Some(e.to_string());
                }
            }
        }

        warn!(
            "All backends exhausted after {} attempts; synthesizing apology",
            attempts.len()
        );
        FinalResponse::all_failed(attempts, last_error)
    }

    fn select_primary(&self, preferred: Option<&str>) -> Option<Arc<dyn GenerativeBackend>> {
        if let Some(name) = preferred {
            match self.registry.get(name) {
                Some(backend) => return Some(backend),
                None => warn!(
                    "Preferred backend '{}' is not registered; using default",
                    name
                ),
            }
        }
        let default = self.registry.default_backend();
        let backend = self.registry.get(default);
        if backend.is_none() {
            warn!("Default backend '{}' is not registered", default);
        }
        backend
    }

    /// One bounded backend call plus validation. A timeout is one failed
    /// attempt, identical to a transport failure.
    async fn run_attempt(
        &self,
        backend: &dyn GenerativeBackend,
        message: &str,
        context: &QueryContext,
    ) -> AttemptOutcome {
        let system_prompt = build_system_prompt(context);
        let call = backend.process_query(message, context, &system_prompt);

        let result = match timeout(self.attempt_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(BackendCallError::Timeout(self.attempt_timeout.as_secs())),
        };

        match result {
            Ok(candidate) => {
                let verdict = validate(&candidate, message);
                if verdict.is_valid {
                    AttemptOutcome::Accepted(candidate)
                } else {
                    debug!(
                        "Backend '{}' reply rejected: {:?}",
                        backend.name(),
                        verdict.error
                    );
                    AttemptOutcome::Rejected(verdict)
                }
            }
            Err(e) => AttemptOutcome::Failed(e),
        }
    }

    /// Acceptance path shared by the retry loop and the cascade: cache
    /// the response and fire off usage logging, both best-effort.
    async fn accept(
        &self,
        candidate: CandidateResponse,
        attempts: Vec<AttemptRecord>,
        cache_key: &str,
        message: &str,
        context: &QueryContext,
    ) -> FinalResponse {
        let response = FinalResponse::accepted(candidate, attempts);
        info!(
            provider = %response.provider,
            attempts = response.attempts.len(),
            "Response accepted"
        );

        self.cache.put(cache_key, &response).await;

        let usage = Arc::clone(&self.usage);
        let logged = response.clone();
        let message = message.to_string();
        let context = context.clone();
        tokio::spawn(async move {
            if let Err(e) = usage.record(&logged, &message, &context).await {
                warn!("Usage logging failed (ignored): {}", e);
            }
        });

        response
    }
}
