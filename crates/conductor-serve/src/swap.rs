// ABOUTME: Transactional backend config swap with rollback on validation failure
// ABOUTME: Stops the current task, builds the new client, commits or rolls back

use crate::channel::{send_or_log, Channel};
use crate::protocol::{Notification, OrchestratorSettings};
use crate::supervisor::TaskSupervisor;
use conductor_core::{apply_defaults, BackendConfig, BackendHandle, EnvDefaults};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SwapState {
    Stable,
    Swapping,
}

/// Coordinates replacement of the session's active backend client.
///
/// Outside the swapping critical section the active configuration is always
/// fully old or fully new; a rejected configuration never touches it.
pub struct ConfigSwapCoordinator {
    active: Arc<BackendHandle>,
    state: SwapState,
}

impl ConfigSwapCoordinator {
    pub fn new(client: BackendHandle) -> Self {
        Self {
            active: Arc::new(client),
            state: SwapState::Stable,
        }
    }

    /// The currently committed backend client.
    pub fn active(&self) -> Arc<BackendHandle> {
        Arc::clone(&self.active)
    }

    /// Redacted settings snapshot of the active configuration.
    pub fn settings_snapshot(&self) -> OrchestratorSettings {
        OrchestratorSettings::snapshot(self.active.config())
    }

    /// Swap to `requested`, reporting the outcome over the channel.
    ///
    /// Returns the new client on commit, `None` on rollback. The rollback
    /// notification reads back the configuration still in effect, not the
    /// rejected one.
    pub async fn update_config(
        &mut self,
        supervisor: &mut TaskSupervisor,
        channel: &dyn Channel,
        requested: BackendConfig,
        defaults: &EnvDefaults,
    ) -> Option<Arc<BackendHandle>> {
        debug_assert_eq!(self.state, SwapState::Stable);
        self.state = SwapState::Swapping;

        // No task may keep running against a half-swapped client.
        supervisor.cancel_current().await;

        let config = apply_defaults(requested, defaults);
        let result = BackendHandle::build(config);
        self.state = SwapState::Stable;

        match result {
            Ok(client) => {
                let client = Arc::new(client);
                self.active = Arc::clone(&client);
                let config = client.config();
                tracing::info!(
                    model = %config.model,
                    backend = %config.backend,
                    "Experiment reset with new backend"
                );
                send_or_log(
                    channel,
                    Notification::response(
                        "System",
                        format!(
                            "Experiment is reset with model {} and backend {}",
                            config.model, config.backend
                        ),
                    ),
                )
                .await;
                send_or_log(
                    channel,
                    Notification::UpdateOrchestratorSettings {
                        settings: self.settings_snapshot(),
                    },
                )
                .await;
                Some(client)
            }
            Err(err) => {
                let config = self.active.config();
                tracing::error!(
                    error = %err,
                    "Orchestrator profile error: unable to restart experiment"
                );
                send_or_log(
                    channel,
                    Notification::response(
                        "System",
                        format!(
                            "Orchestrator Profile Error: Unable to restart experiment: {}. \
                             Experiment is still using backend {} with model {} at {}",
                            err,
                            config.backend,
                            config.model,
                            config.base_url.as_deref().unwrap_or("")
                        ),
                    ),
                )
                .await;
                send_or_log(
                    channel,
                    Notification::UpdateOrchestratorSettings {
                        settings: self.settings_snapshot(),
                    },
                )
                .await;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::LocalChannel;
    use std::time::Duration;
    use tokio::time::timeout;

    fn coordinator() -> ConfigSwapCoordinator {
        let client = BackendHandle::build(
            BackendConfig::new("openai", "gpt-4o").with_api_key("initial-key"),
        )
        .unwrap();
        ConfigSwapCoordinator::new(client)
    }

    async fn recv_soon(
        rx: &mut tokio::sync::mpsc::UnboundedReceiver<Notification>,
    ) -> Notification {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for notification")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn test_commit_replaces_active_config() {
        let (channel, mut rx) = LocalChannel::pair();
        let channel = Arc::new(channel);
        let mut supervisor = TaskSupervisor::new(channel.clone(), 2);
        let mut coordinator = coordinator();

        let requested = BackendConfig::new("ollama", "llama3");
        let committed = coordinator
            .update_config(
                &mut supervisor,
                channel.as_ref(),
                requested.clone(),
                &EnvDefaults::default(),
            )
            .await
            .expect("swap should commit");

        assert_eq!(*committed.config(), requested);
        assert_eq!(*coordinator.active().config(), requested);

        let Notification::Response { message } = recv_soon(&mut rx).await else {
            panic!("expected success response");
        };
        assert!(message.message.contains("model llama3"));
        assert!(message.message.contains("backend ollama"));

        let Notification::UpdateOrchestratorSettings { settings } = recv_soon(&mut rx).await
        else {
            panic!("expected settings snapshot");
        };
        assert_eq!(settings.backend, "ollama");
        assert_eq!(settings.api_key, "");
    }

    #[tokio::test]
    async fn test_rollback_keeps_previous_config_intact() {
        let (channel, mut rx) = LocalChannel::pair();
        let channel = Arc::new(channel);
        let mut supervisor = TaskSupervisor::new(channel.clone(), 2);
        let mut coordinator = coordinator();

        let before = coordinator.active().config().clone();
        let result = coordinator
            .update_config(
                &mut supervisor,
                channel.as_ref(),
                BackendConfig::new("frobnicator", "m"),
                &EnvDefaults::default(),
            )
            .await;

        assert!(result.is_none());
        assert_eq!(*coordinator.active().config(), before);

        let Notification::Response { message } = recv_soon(&mut rx).await else {
            panic!("expected failure response");
        };
        assert!(message.message.contains("Unable to restart experiment"));
        // Reports the configuration still in use, not the rejected one.
        assert!(message.message.contains("still using backend openai"));
        assert!(message.message.contains("model gpt-4o"));

        let Notification::UpdateOrchestratorSettings { settings } = recv_soon(&mut rx).await
        else {
            panic!("expected settings snapshot");
        };
        assert_eq!(settings.backend, "openai");
        assert_eq!(settings.model, "gpt-4o");
        assert_eq!(settings.api_key, "");
    }

    #[tokio::test]
    async fn test_swap_cancels_running_task_first() {
        let (channel, _rx) = LocalChannel::pair();
        let channel = Arc::new(channel);
        let mut supervisor = TaskSupervisor::new(channel.clone(), 2);
        let mut coordinator = coordinator();

        supervisor
            .run(|cancel| async move {
                cancel.cancelled().await;
                Err(conductor_core::TaskError::Cancelled)
            })
            .await;
        assert!(supervisor.has_active_task());
        let generation_before = supervisor.pool().lock().await.generation();

        coordinator
            .update_config(
                &mut supervisor,
                channel.as_ref(),
                BackendConfig::new("ollama", "llama3"),
                &EnvDefaults::default(),
            )
            .await;

        assert!(!supervisor.has_active_task());
        assert!(supervisor.pool().lock().await.generation() > generation_before);
    }

    #[tokio::test]
    async fn test_env_defaults_applied_for_designated_backend_only() {
        let (channel, _rx) = LocalChannel::pair();
        let channel = Arc::new(channel);
        let mut supervisor = TaskSupervisor::new(channel.clone(), 2);
        let mut coordinator = coordinator();

        let defaults = EnvDefaults {
            backend: Some("alcf".to_string()),
            base_url: Some("https://sophia.example".to_string()),
            api_key: Some("site-key".to_string()),
        };

        let committed = coordinator
            .update_config(
                &mut supervisor,
                channel.as_ref(),
                BackendConfig::new("alcf", "llama70b"),
                &defaults,
            )
            .await
            .expect("swap should commit");

        let config = committed.config();
        assert_eq!(config.base_url.as_deref(), Some("https://sophia.example"));
        assert_eq!(config.api_key.as_deref(), Some("site-key"));
    }
}
