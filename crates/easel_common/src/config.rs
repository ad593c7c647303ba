//! Engine configuration.
//!
//! Loaded from a TOML file with per-field defaults, so a missing or
//! partial config never blocks startup. Backend credentials are not
//! stored here; remote entries name the environment variable holding
//! their API key and are skipped at registry build time when it is
//! absent.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Default config file path.
pub const CONFIG_PATH: &str = "/etc/easel/assist.toml";

/// Engine-wide tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Backend used when the caller does not name one.
    #[serde(default = "default_backend")]
    pub default_backend: String,

    /// Attempts against the selected backend before cascading.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Bound on a single backend call. A timeout is one failed attempt.
    #[serde(default = "default_backend_timeout")]
    pub backend_timeout_secs: u64,

    /// Cache entry lifetime.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// In-memory cache capacity (entries).
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    #[serde(default)]
    pub ollama: OllamaConfig,

    /// OpenAI-compatible remote backends, registered only when their
    /// API key environment variable is set.
    #[serde(default)]
    pub remotes: Vec<RemoteBackendConfig>,
}

/// Local Ollama backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_ollama_model")]
    pub model: String,

    /// How long the model stays loaded after a request.
    #[serde(default = "default_keep_alive")]
    pub keep_alive: String,
}

/// One OpenAI-compatible backend (hosted vendor or alternate endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteBackendConfig {
    /// Registry name, unique among backends.
    pub name: String,
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the bearer key.
    pub api_key_env: String,
}

fn default_backend() -> String {
    "ollama".to_string()
}

fn default_max_retries() -> usize {
    3
}

fn default_backend_timeout() -> u64 {
    12
}

fn default_cache_ttl() -> u64 {
    86_400 // 24 hours
}

fn default_cache_capacity() -> usize {
    1_024
}

fn default_ollama_endpoint() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_ollama_model() -> String {
    "qwen3:8b".to_string()
}

fn default_keep_alive() -> String {
    "5m".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_backend: default_backend(),
            max_retries: default_max_retries(),
            backend_timeout_secs: default_backend_timeout(),
            cache_ttl_secs: default_cache_ttl(),
            cache_capacity: default_cache_capacity(),
            ollama: OllamaConfig::default(),
            remotes: Vec::new(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            endpoint: default_ollama_endpoint(),
            model: default_ollama_model(),
            keep_alive: default_keep_alive(),
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        info!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Load from a TOML file, falling back to defaults when the file is
    /// missing or malformed.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                warn!("Using default engine config: {:#}", e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.default_backend, "ollama");
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.backend_timeout_secs, 12);
        assert_eq!(config.cache_ttl_secs, 86_400);
        assert!(config.remotes.is_empty());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            max_retries = 5

            [[remotes]]
            name = "openai"
            endpoint = "https://api.openai.com/v1"
            model = "gpt-4o-mini"
            api_key_env = "OPENAI_API_KEY"
            "#,
        )
        .unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.default_backend, "ollama");
        assert_eq!(config.remotes.len(), 1);
        assert_eq!(config.remotes[0].name, "openai");
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let config = EngineConfig::load_or_default("/nonexistent/easel.toml");
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "backend_timeout_secs = 8").unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.backend_timeout_secs, 8);
    }
}
