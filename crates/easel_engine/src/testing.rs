//! Deterministic fakes for unit and integration tests.
//!
//! Compiled into the crate so integration tests under `tests/` can wire
//! complete orchestrators with no network, no clock dependence, and full
//! visibility into what each collaborator was asked.

use crate::backend::GenerativeBackend;
use crate::cache::{CacheEntry, CacheError, CacheStore};
use crate::enrichment::{ComponentCatalog, TutorialSearch};
use crate::usage::UsageLogger;
use async_trait::async_trait;
use easel_common::{
    BackendCallError, CandidateResponse, ComponentSummary, FinalResponse, QueryContext,
    ResponseMetadata, TutorialRequest, TutorialSummary,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Scripted backend. Plays outcomes in order, then repeats the default
/// outcome forever; records every call's system prompt.
pub struct FakeBackend {
    name: String,
    script: Mutex<VecDeque<Result<CandidateResponse, BackendCallError>>>,
    default_outcome: Result<CandidateResponse, BackendCallError>,
    calls: AtomicUsize,
    system_prompts: Mutex<Vec<String>>,
    available: bool,
}

impl FakeBackend {
    pub fn new(
        name: impl Into<String>,
        default_outcome: Result<CandidateResponse, BackendCallError>,
    ) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            default_outcome,
            calls: AtomicUsize::new(0),
            system_prompts: Mutex::new(Vec::new()),
            available: true,
        }
    }

    /// Backend that always returns the same valid text with default
    /// metadata.
    pub fn always_valid(name: impl Into<String>, text: impl Into<String>) -> Self {
        let name = name.into();
        let candidate = CandidateResponse::new(text, ResponseMetadata::default(), name.clone());
        Self::new(name, Ok(candidate))
    }

    /// Backend that always fails with the given call error.
    pub fn always_failing(name: impl Into<String>, error: BackendCallError) -> Self {
        Self::new(name, Err(error))
    }

    /// Queue outcomes to play before the default kicks in.
    pub fn script(mut self, outcomes: Vec<Result<CandidateResponse, BackendCallError>>) -> Self {
        self.script.get_mut().extend(outcomes);
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn system_prompts(&self) -> Vec<String> {
        self.system_prompts.lock().await.clone()
    }
}

#[async_trait]
impl GenerativeBackend for FakeBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process_query(
        &self,
        _message: &str,
        _context: &QueryContext,
        system_prompt: &str,
    ) -> Result<CandidateResponse, BackendCallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.system_prompts
            .lock()
            .await
            .push(system_prompt.to_string());
        match self.script.lock().await.pop_front() {
            Some(outcome) => outcome,
            None => self.default_outcome.clone(),
        }
    }

    async fn is_available(&self) -> bool {
        self.available
    }
}

/// Catalog fake keyed by component type; records every lookup and
/// every usage ping.
pub struct FakeCatalog {
    entries: Vec<ComponentSummary>,
    requested: Mutex<Vec<String>>,
    usage_events: Mutex<Vec<(String, Option<String>)>>,
}

impl FakeCatalog {
    pub fn new(entries: Vec<ComponentSummary>) -> Self {
        Self {
            entries,
            requested: Mutex::new(Vec::new()),
            usage_events: Mutex::new(Vec::new()),
        }
    }

    pub fn with_entry(component_type: &str, name: &str) -> Self {
        Self::new(vec![ComponentSummary {
            id: format!("{}-1", component_type),
            name: name.to_string(),
            component_type: component_type.to_string(),
            description: None,
        }])
    }

    pub async fn requested_types(&self) -> Vec<String> {
        self.requested.lock().await.clone()
    }

    /// `(component_id, caller_id)` pairs, in recording order.
    pub async fn usage_events(&self) -> Vec<(String, Option<String>)> {
        self.usage_events.lock().await.clone()
    }
}

#[async_trait]
impl ComponentCatalog for FakeCatalog {
    async fn find_by_type(&self, component_type: &str) -> anyhow::Result<Vec<ComponentSummary>> {
        self.requested.lock().await.push(component_type.to_string());
        Ok(self
            .entries
            .iter()
            .filter(|e| e.component_type == component_type)
            .cloned()
            .collect())
    }

    async fn record_usage(
        &self,
        component_id: &str,
        caller_id: Option<&str>,
    ) -> anyhow::Result<()> {
        self.usage_events
            .lock()
            .await
            .push((component_id.to_string(), caller_id.map(str::to_string)));
        Ok(())
    }
}

/// Catalog that always errors, for degradation tests.
pub struct FailingCatalog;

#[async_trait]
impl ComponentCatalog for FailingCatalog {
    async fn find_by_type(&self, _component_type: &str) -> anyhow::Result<Vec<ComponentSummary>> {
        anyhow::bail!("catalog service unreachable")
    }

    async fn record_usage(
        &self,
        _component_id: &str,
        _caller_id: Option<&str>,
    ) -> anyhow::Result<()> {
        anyhow::bail!("catalog service unreachable")
    }
}

/// Tutorial search fake with a fixed number of hits per topic; honors
/// the request's result cap and records every request.
pub struct FakeTutorialSearch {
    topic: String,
    hits_available: usize,
    requests: Mutex<Vec<TutorialRequest>>,
}

impl FakeTutorialSearch {
    pub fn with_hits(topic: &str, hits_available: usize) -> Self {
        Self {
            topic: topic.to_string(),
            hits_available,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub async fn requests(&self) -> Vec<TutorialRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl TutorialSearch for FakeTutorialSearch {
    async fn search(&self, request: &TutorialRequest) -> anyhow::Result<Vec<TutorialSummary>> {
        self.requests.lock().await.push(request.clone());
        if request.topic != self.topic {
            return Ok(Vec::new());
        }
        Ok((0..self.hits_available.min(request.max_results))
            .map(|i| TutorialSummary {
                title: format!("{} (part {})", self.topic, i + 1),
                url: format!("https://videos.example/{}/{}", self.topic.replace(' ', "-"), i),
                topic: self.topic.clone(),
            })
            .collect())
    }
}

/// Cache store that is always down.
pub struct FailingCacheStore;

#[async_trait]
impl CacheStore for FailingCacheStore {
    async fn get(&self, _key: &str) -> Result<Option<CacheEntry>, CacheError> {
        Err(CacheError::Unavailable("store offline".to_string()))
    }

    async fn put(&self, _key: &str, _entry: CacheEntry) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("store offline".to_string()))
    }
}

/// Usage logger that always errors, for fire-and-forget tests.
pub struct FailingUsageLogger;

#[async_trait]
impl UsageLogger for FailingUsageLogger {
    async fn record(
        &self,
        _response: &FinalResponse,
        _message: &str,
        _context: &QueryContext,
    ) -> anyhow::Result<()> {
        anyhow::bail!("analytics sink rejected the event")
    }
}

/// Usage logger that counts records.
#[derive(Default)]
pub struct CountingUsageLogger {
    records: AtomicUsize,
}

impl CountingUsageLogger {
    pub fn records(&self) -> usize {
        self.records.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UsageLogger for CountingUsageLogger {
    async fn record(
        &self,
        _response: &FinalResponse,
        _message: &str,
        _context: &QueryContext,
    ) -> anyhow::Result<()> {
        self.records.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
