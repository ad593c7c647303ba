//! Backend capability contract and registry.
//!
//! Every generative backend implements one uniform async trait; the
//! orchestrator never inspects backend-specific details. The registry is
//! built once at process start from an explicit factory list evaluated
//! against configuration and credentials - no lazy loading, no runtime
//! reflection - and is read-only afterward except for the explicit
//! administrative override of the default backend name.

use crate::backends::{OllamaBackend, OpenAiCompatBackend};
use async_trait::async_trait;
use easel_common::{BackendCallError, CandidateResponse, EngineConfig, QueryContext};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The one capability every generative backend provides.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Registry key. Unique among registered backends.
    fn name(&self) -> &str;

    /// One generation call. Transport, auth, quota, and timeout failures
    /// are all reported as `BackendCallError`; exceptions never cross
    /// this boundary.
    async fn process_query(
        &self,
        message: &str,
        context: &QueryContext,
        system_prompt: &str,
    ) -> Result<CandidateResponse, BackendCallError>;

    /// Cheap reachability probe. Best-effort; defaults to available.
    async fn is_available(&self) -> bool {
        true
    }
}

/// Read-only set of registered backends, in registration order.
///
/// Registration order matters: the fallback cascade walks backends in
/// this order, skipping the primary.
pub struct BackendRegistry {
    backends: Vec<Arc<dyn GenerativeBackend>>,
    default_backend: String,
}

impl BackendRegistry {
    pub fn new(default_backend: impl Into<String>) -> Self {
        Self {
            backends: Vec::new(),
            default_backend: default_backend.into(),
        }
    }

    /// Build the registry from configuration. Each factory either
    /// registers a backend or is skipped: Ollama always registers;
    /// each remote registers only when its API key variable is set.
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut registry = Self::new(&config.default_backend);

        registry.register(Arc::new(OllamaBackend::new(
            &config.ollama,
            config.backend_timeout_secs,
        )));

        for remote in &config.remotes {
            match std::env::var(&remote.api_key_env) {
                Ok(key) if !key.is_empty() => {
                    registry.register(Arc::new(OpenAiCompatBackend::new(
                        remote,
                        key,
                        config.backend_timeout_secs,
                    )));
                }
                _ => {
                    debug!(
                        "Skipping backend '{}': {} not set",
                        remote.name, remote.api_key_env
                    );
                }
            }
        }

        if !registry.contains(&registry.default_backend) {
            warn!(
                "Default backend '{}' is not registered; orchestration will \
                 fall through to the cascade",
                registry.default_backend
            );
        }

        info!(
            "Backend registry initialized: {:?} (default: {})",
            registry.names(),
            registry.default_backend
        );
        registry
    }

    pub fn register(&mut self, backend: Arc<dyn GenerativeBackend>) {
        debug!("Registering backend '{}'", backend.name());
        self.backends.push(backend);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn GenerativeBackend>> {
        self.backends
            .iter()
            .find(|b| b.name() == name)
            .map(Arc::clone)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.backends.iter().any(|b| b.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn default_backend(&self) -> &str {
        &self.default_backend
    }

    /// Administrative override of the default backend. The only runtime
    /// mutation the registry supports; refuses unregistered names.
    pub fn set_default_backend(&mut self, name: &str) -> bool {
        if self.contains(name) {
            info!("Default backend overridden to '{}'", name);
            self.default_backend = name.to_string();
            true
        } else {
            warn!("Refusing to set unregistered default backend '{}'", name);
            false
        }
    }

    /// Cascade order: every registered backend except the named one,
    /// in registration order.
    pub fn others(&self, excluding: &str) -> Vec<Arc<dyn GenerativeBackend>> {
        self.backends
            .iter()
            .filter(|b| b.name() != excluding)
            .map(Arc::clone)
            .collect()
    }

    /// Probe every backend. Best-effort health snapshot.
    pub async fn available_backends(&self) -> Vec<&str> {
        let mut available = Vec::new();
        for backend in &self.backends {
            if backend.is_available().await {
                available.push(backend.name());
            }
        }
        available
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;

    fn registry_with(names: &[&str], default: &str) -> BackendRegistry {
        let mut registry = BackendRegistry::new(default);
        for name in names {
            registry.register(Arc::new(FakeBackend::always_valid(
                *name,
                "A perfectly reasonable design answer.",
            )));
        }
        registry
    }

    #[test]
    fn test_lookup_and_names() {
        let registry = registry_with(&["ollama", "openai"], "ollama");
        assert_eq!(registry.len(), 2);
        assert!(registry.get("openai").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.names(), vec!["ollama", "openai"]);
    }

    #[test]
    fn test_others_preserves_registration_order() {
        let registry = registry_with(&["a", "b", "c"], "b");
        let others: Vec<String> = registry
            .others("b")
            .iter()
            .map(|b| b.name().to_string())
            .collect();
        assert_eq!(others, vec!["a", "c"]);
    }

    #[test]
    fn test_set_default_rejects_unregistered() {
        let mut registry = registry_with(&["ollama"], "ollama");
        assert!(!registry.set_default_backend("nope"));
        assert_eq!(registry.default_backend(), "ollama");
        assert!(registry.set_default_backend("ollama"));
    }

    #[tokio::test]
    async fn test_available_backends() {
        let registry = registry_with(&["a", "b"], "a");
        let available = registry.available_backends().await;
        assert_eq!(available, vec!["a", "b"]);
    }
}
