// ABOUTME: Configuration loading and management for conductor
// ABOUTME: Supports TOML config files with sensible defaults

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Worker pool settings
    pub pool: PoolConfig,
    /// Default backend settings applied to new sessions
    pub backend: BackendDefaults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of workers per session pool
    pub capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { capacity: 4 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendDefaults {
    /// Backend id new sessions start on
    pub backend: String,
    /// Model new sessions start on
    pub model: String,
    /// Base URL override (for gateway backends)
    pub base_url: Option<String>,
    /// API key (prefer CONDUCTOR_DEFAULT_API_KEY over storing it here)
    pub api_key: Option<String>,
}

impl Default for BackendDefaults {
    fn default() -> Self {
        Self {
            backend: "openai".to_string(),
            model: "gpt-4o".to_string(),
            base_url: None,
            api_key: None,
        }
    }
}

impl Config {
    /// Get the XDG config directory for conductor (~/.config/conductor)
    pub fn config_dir() -> PathBuf {
        // Respect XDG_CONFIG_HOME if set, otherwise use ~/.config
        std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .map(|p| p.join(".config"))
                    .unwrap_or_else(|| PathBuf::from("."))
            })
            .join("conductor")
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load config from XDG config directory
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if path.exists() {
            Self::load_from(&path)
        } else {
            // No config found, use defaults
            Ok(Self::default())
        }
    }

    /// Load config from a specific path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        Ok(config)
    }

    /// Generate a default config file content
    pub fn default_toml() -> String {
        r#"# conductor configuration
# Location: ~/.config/conductor/config.toml

[pool]
# Number of workers per session pool
capacity = 4

[backend]
backend = "openai"
model = "gpt-4o"
# base_url = "https://gateway.example/v1"  # For gateway backends
# api_key = ""  # Prefer CONDUCTOR_DEFAULT_API_KEY
"#
        .to_string()
    }

    /// Initialize config directory and create default config if needed
    pub fn init() -> Result<PathBuf> {
        let config_dir = Self::config_dir();
        let config_path = Self::config_path();

        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config dir: {}", config_dir.display()))?;

        if !config_path.exists() {
            std::fs::write(&config_path, Self::default_toml())
                .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        }

        Ok(config_path)
    }
}
