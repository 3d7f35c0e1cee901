// ABOUTME: Wire types for the duplex message channel
// ABOUTME: Outbound notifications and inbound control messages, tagged on "type"

use conductor_core::{backend_label, uses_custom_url, BackendConfig};
use serde::{Deserialize, Serialize};

/// Free-text status/diagnostic line shown to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseBody {
    pub source: String,
    pub message: String,
}

/// Current configuration snapshot for the client settings panel.
/// The api key is always redacted to the empty string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorSettings {
    pub backend: String,
    pub backend_label: String,
    pub use_custom_url: bool,
    pub custom_url: String,
    pub model: String,
    pub use_custom_model: bool,
    pub api_key: String,
}

impl OrchestratorSettings {
    /// Build a redacted snapshot of a backend configuration.
    pub fn snapshot(config: &BackendConfig) -> Self {
        Self {
            backend: config.backend.clone(),
            backend_label: backend_label(&config.backend).to_string(),
            use_custom_url: uses_custom_url(&config.backend),
            custom_url: config.base_url.clone().unwrap_or_default(),
            model: config.model.clone(),
            use_custom_model: false,
            api_key: String::new(),
        }
    }
}

/// Notifications sent to the client over the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Notification {
    Response {
        message: ResponseBody,
    },
    Complete,
    Stopped,
    #[serde(rename = "server-update-orchestrator-settings")]
    UpdateOrchestratorSettings {
        settings: OrchestratorSettings,
    },
    SaveContextResponse {
        #[serde(rename = "experimentContext")]
        experiment_context: serde_json::Value,
    },
    GetUsernameResponse {
        username: String,
    },
}

impl Notification {
    pub fn response(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Response {
            message: ResponseBody {
                source: source.into(),
                message: message.into(),
            },
        }
    }
}

/// Requested backend settings carried by an `update-config` message.
/// Empty strings mean "not provided".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub backend: String,
    pub model: String,
    #[serde(default)]
    pub custom_url: String,
    #[serde(default)]
    pub api_key: String,
}

impl SettingsUpdate {
    /// Normalize into a backend configuration, mapping empty fields to None.
    pub fn into_config(self) -> BackendConfig {
        BackendConfig {
            backend: self.backend,
            model: self.model,
            base_url: none_if_empty(self.custom_url),
            api_key: none_if_empty(self.api_key),
        }
    }
}

fn none_if_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Control messages arriving from the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ControlMessage {
    Run {
        prompt: String,
    },
    Stop,
    Reset,
    UpdateConfig {
        settings: SettingsUpdate,
    },
    SaveState,
    LoadState {
        #[serde(rename = "experimentContext")]
        experiment_context: serde_json::Value,
    },
    GetUsername,
}
