//! End-to-end orchestration behavior with fake backends and
//! collaborators: caching, retry with corrective hints, the fallback
//! cascade, attempt accounting, and graceful degradation.

use easel_engine::cache::ResponseCache;
use easel_engine::testing::{
    CountingUsageLogger, FailingCacheStore, FailingUsageLogger, FakeBackend, FakeCatalog,
};
use easel_engine::{
    BackendRegistry, EnrichmentPipeline, GenerativeBackend, QueryOrchestrator, TracingUsageLogger,
    UsageLogger,
};
use easel_common::{
    BackendCallError, CandidateResponse, EngineConfig, IntentAction, QueryContext,
    ResponseMetadata, SkillLevel,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

fn config() -> EngineConfig {
    EngineConfig::default()
}

fn orchestrator(
    registry: BackendRegistry,
    cache: ResponseCache,
    usage: Arc<dyn UsageLogger>,
) -> QueryOrchestrator {
    static TRACING: std::sync::Once = std::sync::Once::new();
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
    QueryOrchestrator::new(Arc::new(registry), cache, usage, &config())
}

fn context(message: &str) -> QueryContext {
    QueryContext::new(message, SkillLevel::Beginner)
}

fn short_reply(provider: &str) -> CandidateResponse {
    CandidateResponse::new("ok", ResponseMetadata::default(), provider)
}

fn button_metadata() -> ResponseMetadata {
    ResponseMetadata {
        action: Some("create".to_string()),
        component_type: Some("button".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn identical_queries_hit_the_cache_without_a_second_backend_call() {
    let backend = Arc::new(FakeBackend::always_valid(
        "ollama",
        "Auto layout resizes frames as content changes.",
    ));
    let mut registry = BackendRegistry::new("ollama");
    registry.register(backend.clone());
    let orch = orchestrator(
        registry,
        ResponseCache::in_memory(16, 3600),
        Arc::new(TracingUsageLogger),
    );

    let first = orch
        .process_query("what is auto layout", context("what is auto layout"), None)
        .await;
    let second = orch
        .process_query(
            "  What is  AUTO layout ",
            context("  What is  AUTO layout "),
            None,
        )
        .await;

    assert_eq!(backend.calls(), 1);
    assert_eq!(first.text, second.text);
    assert_eq!(first.provider, second.provider);
    assert_eq!(first.attempts, second.attempts);
}

#[tokio::test]
async fn skill_level_partitions_the_cache() {
    let backend = Arc::new(FakeBackend::always_valid(
        "ollama",
        "Auto layout resizes frames as content changes.",
    ));
    let mut registry = BackendRegistry::new("ollama");
    registry.register(backend.clone());
    let orch = orchestrator(
        registry,
        ResponseCache::in_memory(16, 3600),
        Arc::new(TracingUsageLogger),
    );

    orch.process_query("what is auto layout", context("what is auto layout"), None)
        .await;
    orch.process_query(
        "what is auto layout",
        QueryContext::new("what is auto layout", SkillLevel::Advanced),
        None,
    )
    .await;

    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn rejected_attempt_feeds_a_corrective_hint_into_the_next_prompt() {
    let backend = Arc::new(
        FakeBackend::always_valid("ollama", "Spacing keeps layouts breathable.")
            .script(vec![Ok(short_reply("ollama"))]),
    );
    let mut registry = BackendRegistry::new("ollama");
    registry.register(backend.clone());
    let orch = orchestrator(
        registry,
        ResponseCache::in_memory(16, 3600),
        Arc::new(TracingUsageLogger),
    );

    let response = orch
        .process_query(
            "tell me about spacing",
            context("tell me about spacing"),
            None,
        )
        .await;

    assert_eq!(backend.calls(), 2);
    let prompts = backend.system_prompts().await;
    assert!(!prompts[0].contains("rejected"));
    assert!(prompts[1].contains("Your previous reply was rejected"));
    assert!(prompts[1].contains("fuller answer"));

    assert_eq!(response.attempts.len(), 2);
    assert_eq!(
        response.attempts[0].validation_error.as_deref(),
        Some("too_short")
    );
    assert!(response.attempts[1].success);
}

#[tokio::test]
async fn unparsed_metadata_is_retried_as_a_parse_error() {
    let backend = Arc::new(
        FakeBackend::always_valid("ollama", "Frames group related layers together.").script(vec![
            Ok(CandidateResponse::unparsed(
                "Frames group related layers together.",
                "ollama",
            )),
        ]),
    );
    let mut registry = BackendRegistry::new("ollama");
    registry.register(backend.clone());
    let orch = orchestrator(
        registry,
        ResponseCache::in_memory(16, 3600),
        Arc::new(TracingUsageLogger),
    );

    let response = orch
        .process_query("what are frames", context("what are frames"), None)
        .await;

    assert_eq!(
        response.attempts[0].validation_error.as_deref(),
        Some("parse_error")
    );
    assert!(response.attempts[1].success);
}

#[tokio::test]
async fn exhaustion_counts_retries_plus_one_cascade_attempt_per_other_backend() {
    let mut registry = BackendRegistry::new("a");
    for name in ["a", "b", "c"] {
        registry.register(Arc::new(FakeBackend::always_failing(
            name,
            BackendCallError::Unavailable("connection refused".to_string()),
        )));
    }
    let orch = orchestrator(
        registry,
        ResponseCache::in_memory(16, 3600),
        Arc::new(TracingUsageLogger),
    );

    let response = orch
        .process_query("hello there", context("hello there"), None)
        .await;

    // max_retries on the primary plus one attempt per other backend.
    assert_eq!(response.attempts.len(), config().max_retries + 2);
    assert!(response.attempts.iter().all(|a| !a.success));
    assert_eq!(response.provider, "error");
    assert!(response.error.as_deref().unwrap().contains("unavailable"));
    assert!(!response.text.contains("connection refused"));
}

#[tokio::test]
async fn cascade_attempts_do_not_inherit_the_primary_hint() {
    let primary = Arc::new(FakeBackend::new("a", Ok(short_reply("a"))));
    let fallback = Arc::new(FakeBackend::always_valid(
        "b",
        "Constraints pin layers to frame edges.",
    ));
    let mut registry = BackendRegistry::new("a");
    registry.register(primary.clone());
    registry.register(fallback.clone());
    let orch = orchestrator(
        registry,
        ResponseCache::in_memory(16, 3600),
        Arc::new(TracingUsageLogger),
    );

    let response = orch
        .process_query(
            "tell me about constraints",
            context("tell me about constraints"),
            None,
        )
        .await;

    assert_eq!(response.provider, "b");
    assert_eq!(primary.calls(), config().max_retries);

    // The primary accumulated hints across its retries; the cascade
    // attempt starts clean.
    let primary_prompts = primary.system_prompts().await;
    assert!(primary_prompts[1].contains("rejected"));
    let fallback_prompts = fallback.system_prompts().await;
    assert_eq!(fallback_prompts.len(), 1);
    assert!(!fallback_prompts[0].contains("rejected"));
}

#[tokio::test]
async fn preferred_backend_overrides_the_default() {
    let local = Arc::new(FakeBackend::always_valid(
        "local",
        "A sensible local answer.",
    ));
    let remote = Arc::new(FakeBackend::always_valid(
        "remote",
        "A sensible remote answer.",
    ));
    let mut registry = BackendRegistry::new("local");
    registry.register(local.clone());
    registry.register(remote.clone());
    let orch = orchestrator(
        registry,
        ResponseCache::in_memory(16, 3600),
        Arc::new(TracingUsageLogger),
    );

    let response = orch
        .process_query("hello there", context("hello there"), Some("remote"))
        .await;

    assert_eq!(response.provider, "remote");
    assert_eq!(local.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn a_hung_backend_times_out_and_the_cascade_takes_over() {
    struct HungBackend;

    #[async_trait]
    impl GenerativeBackend for HungBackend {
        fn name(&self) -> &str {
            "hung"
        }

        async fn process_query(
            &self,
            _message: &str,
            _context: &QueryContext,
            _system_prompt: &str,
        ) -> Result<CandidateResponse, BackendCallError> {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Ok(short_reply("hung"))
        }
    }

    let mut registry = BackendRegistry::new("hung");
    registry.register(Arc::new(HungBackend));
    registry.register(Arc::new(FakeBackend::always_valid(
        "fallback",
        "Grids keep columns aligned across screens.",
    )));
    let orch = orchestrator(
        registry,
        ResponseCache::in_memory(16, 3600),
        Arc::new(TracingUsageLogger),
    );

    let response = orch
        .process_query("hello there", context("hello there"), None)
        .await;

    assert_eq!(response.provider, "fallback");
    for attempt in &response.attempts[..config().max_retries] {
        assert_eq!(attempt.backend, "hung");
        assert!(attempt.error.as_deref().unwrap().contains("timed out"));
    }
}

#[tokio::test]
async fn a_backend_narrating_its_own_failure_is_rejected_every_time() {
    let mut registry = BackendRegistry::new("ollama");
    registry.register(Arc::new(FakeBackend::always_valid(
        "ollama",
        "I'm sorry, there was an error processing that request.",
    )));
    let orch = orchestrator(
        registry,
        ResponseCache::in_memory(16, 3600),
        Arc::new(TracingUsageLogger),
    );

    let response = orch
        .process_query("what is auto layout", context("what is auto layout"), None)
        .await;

    assert_eq!(response.provider, "error");
    assert!(response
        .attempts
        .iter()
        .all(|a| a.validation_error.as_deref() == Some("contains_error_language")));
}

#[tokio::test]
async fn apology_responses_are_not_cached() {
    let backend = Arc::new(
        FakeBackend::always_valid("ollama", "Layers stack in the order you draw them.").script(
            vec![
                Err(BackendCallError::Unavailable("down".to_string())),
                Err(BackendCallError::Unavailable("down".to_string())),
                Err(BackendCallError::Unavailable("down".to_string())),
            ],
        ),
    );
    let mut registry = BackendRegistry::new("ollama");
    registry.register(backend.clone());
    let orch = orchestrator(
        registry,
        ResponseCache::in_memory(16, 3600),
        Arc::new(TracingUsageLogger),
    );

    let first = orch
        .process_query("what are layers", context("what are layers"), None)
        .await;
    assert!(first.is_error());

    // The backend recovered; a fresh orchestration must reach it
    // instead of replaying the apology.
    let second = orch
        .process_query("what are layers", context("what are layers"), None)
        .await;
    assert!(!second.is_error());
    assert_eq!(second.provider, "ollama");
}

#[tokio::test]
async fn cache_store_outage_degrades_to_misses() {
    let backend = Arc::new(FakeBackend::always_valid(
        "ollama",
        "Styles keep colors consistent across the file.",
    ));
    let mut registry = BackendRegistry::new("ollama");
    registry.register(backend.clone());
    let orch = orchestrator(
        registry,
        ResponseCache::new(Arc::new(FailingCacheStore), 3600),
        Arc::new(TracingUsageLogger),
    );

    let first = orch
        .process_query("what are styles", context("what are styles"), None)
        .await;
    let second = orch
        .process_query("what are styles", context("what are styles"), None)
        .await;

    assert!(!first.is_error());
    assert!(!second.is_error());
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn usage_logging_failure_never_reaches_the_caller() {
    let mut registry = BackendRegistry::new("ollama");
    registry.register(Arc::new(FakeBackend::always_valid(
        "ollama",
        "Plugins extend the canvas with custom tools.",
    )));
    let orch = orchestrator(
        registry,
        ResponseCache::in_memory(16, 3600),
        Arc::new(FailingUsageLogger),
    );

    let response = orch
        .process_query("what are plugins", context("what are plugins"), None)
        .await;
    assert!(!response.is_error());
}

#[tokio::test]
async fn accepted_responses_are_recorded_for_usage() {
    let logger = Arc::new(CountingUsageLogger::default());
    let mut registry = BackendRegistry::new("ollama");
    registry.register(Arc::new(FakeBackend::always_valid(
        "ollama",
        "Variants bundle component states together.",
    )));
    let orch = orchestrator(
        registry,
        ResponseCache::in_memory(16, 3600),
        logger.clone(),
    );

    orch.process_query("what are variants", context("what are variants"), None)
        .await;

    // Recording is fire-and-forget on a spawned task.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(logger.records(), 1);
}

#[tokio::test]
async fn component_request_flows_through_validation_and_enrichment() {
    let message = "How do I create a button?";
    let mut registry = BackendRegistry::new("ollama");
    registry.register(Arc::new(FakeBackend::new(
        "ollama",
        Ok(CandidateResponse::new(
            "Draw a rectangle, round the corners, and add a text label.",
            button_metadata(),
            "ollama",
        )),
    )));
    let orch = orchestrator(
        registry,
        ResponseCache::in_memory(16, 3600),
        Arc::new(TracingUsageLogger),
    );

    let response = orch.process_query(message, context(message), None).await;
    assert!(!response.is_error());
    assert_eq!(response.metadata.component_type.as_deref(), Some("button"));

    let catalog = Arc::new(FakeCatalog::with_entry("button", "Primary Button"));
    let pipeline = EnrichmentPipeline::new().with_catalog(catalog.clone());
    let enrichment = pipeline.enrich(&context(message), &response.text).await;

    assert_eq!(enrichment.intent.action, Some(IntentAction::Create));
    assert_eq!(
        enrichment.intent.component_types,
        vec!["button".to_string()]
    );
    assert_eq!(enrichment.components.len(), 1);
    // A question from a beginner gets the step-by-step walkthrough.
    assert_eq!(enrichment.guidance.len(), 3);

    // The suggested component gets its analytics ping off the hot path.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let events = catalog.usage_events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, "button-1");
}

#[tokio::test]
async fn component_request_without_metadata_is_rejected_until_corrected() {
    let message = "create a button please";
    let backend = Arc::new(
        FakeBackend::new(
            "ollama",
            Ok(CandidateResponse::new(
                "Here is a primary button for your frame.",
                button_metadata(),
                "ollama",
            )),
        )
        .script(vec![Ok(CandidateResponse::new(
            "Sure, a button would look great here.",
            ResponseMetadata::default(),
            "ollama",
        ))]),
    );
    let mut registry = BackendRegistry::new("ollama");
    registry.register(backend.clone());
    let orch = orchestrator(
        registry,
        ResponseCache::in_memory(16, 3600),
        Arc::new(TracingUsageLogger),
    );

    let response = orch.process_query(message, context(message), None).await;

    assert_eq!(
        response.attempts[0].validation_error.as_deref(),
        Some("missing_component_metadata")
    );
    assert!(response.attempts[1].success);
    let prompts = backend.system_prompts().await;
    assert!(prompts[1].contains("componentType"));
}
