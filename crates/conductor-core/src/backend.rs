// ABOUTME: Backend configuration and validated client construction
// ABOUTME: Labels, custom-URL detection, and environment-provided defaults

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Mapping from backend id to human-readable label. Mirrored from the frontend.
const BACKEND_LABELS: &[(&str, &str)] = &[
    ("openai", "OpenAI"),
    ("livai", "LivAI"),
    ("livchat", "LivChat"),
    ("llamame", "LLamaMe"),
    ("alcf", "ALCF Sophia"),
    ("gemini", "Google Gemini"),
    ("ollama", "Ollama"),
    ("vllm", "vLLM"),
    ("huggingface", "HuggingFace Local"),
    ("custom", "Custom URL"),
];

/// Backends that are reached through a gateway URL rather than a vendor API.
const CUSTOM_URL_BACKENDS: &[&str] = &["livai", "livchat", "llamame", "alcf"];

/// Human-readable label for a backend id, falling back to the id itself.
pub fn backend_label(backend: &str) -> &str {
    BACKEND_LABELS
        .iter()
        .find(|(id, _)| *id == backend)
        .map(|(_, label)| *label)
        .unwrap_or(backend)
}

/// Whether settings snapshots should report this backend as custom-URL.
pub fn uses_custom_url(backend: &str) -> bool {
    CUSTOM_URL_BACKENDS.contains(&backend)
}

fn is_known_backend(backend: &str) -> bool {
    BACKEND_LABELS.iter().any(|(id, _)| *id == backend)
}

/// Immutable backend configuration.
///
/// A configuration change always produces a new value, never an in-place
/// mutation, so the prior configuration stays available for rollback
/// reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub backend: String,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl BackendConfig {
    pub fn new(backend: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            model: model.into(),
            base_url: None,
            api_key: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

/// Environment-provided defaults, consulted only when the selected backend
/// equals the designated default backend and no explicit override was given.
#[derive(Debug, Clone, Default)]
pub struct EnvDefaults {
    pub backend: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl EnvDefaults {
    pub fn from_env() -> Self {
        Self {
            backend: std::env::var("CONDUCTOR_DEFAULT_BACKEND").ok(),
            base_url: std::env::var("CONDUCTOR_DEFAULT_URL").ok(),
            api_key: std::env::var("CONDUCTOR_DEFAULT_API_KEY").ok(),
        }
    }
}

/// Fill in `base_url`/`api_key` from the environment defaults, returning a
/// new configuration. Fields the caller set explicitly are left alone.
pub fn apply_defaults(config: BackendConfig, defaults: &EnvDefaults) -> BackendConfig {
    if defaults.backend.as_deref() != Some(config.backend.as_str()) {
        return config;
    }
    let BackendConfig {
        backend,
        model,
        base_url,
        api_key,
    } = config;
    BackendConfig {
        backend,
        model,
        base_url: base_url.or_else(|| defaults.base_url.clone()),
        api_key: api_key.or_else(|| defaults.api_key.clone()),
    }
}

/// A constructed backend client.
///
/// Construction is the validation point: a handle existing means its
/// configuration was accepted. The handle is replaced wholesale on a config
/// swap, never mutated.
#[derive(Debug, Clone)]
pub struct BackendHandle {
    config: BackendConfig,
}

impl BackendHandle {
    /// Validate a configuration and construct a client for it.
    pub fn build(config: BackendConfig) -> Result<Self, ConfigError> {
        if !is_known_backend(&config.backend) {
            return Err(ConfigError::UnknownBackend(config.backend));
        }
        if config.model.trim().is_empty() {
            return Err(ConfigError::MissingModel(config.backend));
        }
        if config.backend == "custom" && config.base_url.is_none() {
            return Err(ConfigError::MissingBaseUrl(config.backend));
        }
        tracing::info!(
            backend = %config.backend,
            model = %config.model,
            "Constructed backend client"
        );
        Ok(Self { config })
    }

    /// Read back the configuration this client was built from.
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }
}
