// ABOUTME: Per-connection session state and control-message dispatch
// ABOUTME: Owns the supervisor, swap coordinator, and the experiment seam

use crate::channel::{send_or_log, Channel};
use crate::pool::WorkerPool;
use crate::protocol::{ControlMessage, Notification};
use crate::supervisor::TaskSupervisor;
use crate::swap::ConfigSwapCoordinator;
use async_trait::async_trait;
use conductor_core::{BackendConfig, BackendHandle, EnvDefaults, TaskError};
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Resources handed to a task body when it starts.
pub struct TaskContext {
    /// Cooperative cancellation signal for this task.
    pub cancel: CancellationToken,
    /// Worker pool for offloading heavy work.
    pub pool: Arc<Mutex<WorkerPool>>,
}

/// The domain work a session supervises. Opaque to the runtime apart from
/// this contract; implementations own their interior mutability.
#[async_trait]
pub trait Experiment: Send + Sync {
    /// Produce the task body for a run request.
    fn task(&self, prompt: String, ctx: TaskContext) -> BoxFuture<'static, Result<(), TaskError>>;

    /// Reset to a clean state. Idempotent.
    async fn reset(&self);

    /// Serialize the current state for the client to hold on to.
    async fn save_state(&self) -> anyhow::Result<serde_json::Value>;

    /// Restore previously saved state.
    async fn load_state(&self, context: serde_json::Value) -> anyhow::Result<()>;
}

/// Builds a fresh experiment for a newly committed backend client.
pub trait ExperimentFactory: Send + Sync {
    fn build(&self, client: Arc<BackendHandle>) -> Arc<dyn Experiment>;
}

/// One connected client's supervised state.
///
/// All mutation flows through `handle`, one message at a time; nothing here
/// is shared across sessions.
pub struct Session {
    id: Uuid,
    channel: Arc<dyn Channel>,
    supervisor: TaskSupervisor,
    coordinator: ConfigSwapCoordinator,
    experiment: Arc<dyn Experiment>,
    factory: Arc<dyn ExperimentFactory>,
    defaults: EnvDefaults,
    username: String,
}

impl Session {
    pub fn new(
        channel: Arc<dyn Channel>,
        client: BackendHandle,
        factory: Arc<dyn ExperimentFactory>,
        username: impl Into<String>,
        pool_capacity: usize,
    ) -> Self {
        let supervisor = TaskSupervisor::new(Arc::clone(&channel), pool_capacity);
        let coordinator = ConfigSwapCoordinator::new(client);
        let experiment = factory.build(coordinator.active());
        let session = Self {
            id: Uuid::new_v4(),
            channel,
            supervisor,
            coordinator,
            experiment,
            factory,
            defaults: EnvDefaults::from_env(),
            username: username.into(),
        };
        tracing::info!(session_id = %session.id, "Session created");
        session
    }

    /// Override the environment-provided defaults (tests, embedders).
    pub fn with_env_defaults(mut self, defaults: EnvDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Configuration of the currently committed backend client.
    pub fn active_config(&self) -> BackendConfig {
        self.coordinator.active().config().clone()
    }

    /// Dispatch one inbound control message. Never fails the session: every
    /// error path ends in a notification or a log line.
    pub async fn handle(&mut self, message: ControlMessage) {
        match message {
            ControlMessage::Run { prompt } => {
                tracing::info!(session_id = %self.id, "Run action received");
                let experiment = Arc::clone(&self.experiment);
                let pool = self.supervisor.pool();
                self.supervisor
                    .run(move |cancel| experiment.task(prompt, TaskContext { cancel, pool }))
                    .await;
            }
            ControlMessage::Stop => {
                tracing::info!(session_id = %self.id, "Stop action received");
                self.supervisor.stop().await;
            }
            ControlMessage::Reset => {
                tracing::info!(session_id = %self.id, "Reset action received");
                self.supervisor.cancel_current().await;
                self.experiment.reset().await;
            }
            ControlMessage::UpdateConfig { settings } => {
                tracing::info!(session_id = %self.id, "Settings update received");
                let requested = settings.into_config();
                self.supervisor.cancel_current().await;
                self.experiment.reset().await;
                if let Some(client) = self
                    .coordinator
                    .update_config(
                        &mut self.supervisor,
                        self.channel.as_ref(),
                        requested,
                        &self.defaults,
                    )
                    .await
                {
                    self.experiment = self.factory.build(client);
                }
            }
            ControlMessage::SaveState => {
                tracing::info!(session_id = %self.id, "Save state action received");
                match self.experiment.save_state().await {
                    Ok(context) => {
                        send_or_log(
                            self.channel.as_ref(),
                            Notification::SaveContextResponse {
                                experiment_context: context,
                            },
                        )
                        .await;
                    }
                    Err(err) => {
                        tracing::error!(session_id = %self.id, error = %err, "Failed to save state");
                    }
                }
            }
            ControlMessage::LoadState { experiment_context } => {
                tracing::info!(session_id = %self.id, "Load state action received");
                if experiment_context.is_null() {
                    tracing::error!(session_id = %self.id, "No experiment context provided for loading state");
                    return;
                }
                if let Err(err) = self.experiment.load_state(experiment_context).await {
                    tracing::error!(session_id = %self.id, error = %err, "Failed to load state");
                }
            }
            ControlMessage::GetUsername => {
                send_or_log(
                    self.channel.as_ref(),
                    Notification::GetUsernameResponse {
                        username: self.username.clone(),
                    },
                )
                .await;
            }
        }
    }

    /// Tear the session down: cancel any active task and release the pool.
    pub async fn close(&mut self) {
        tracing::info!(session_id = %self.id, "Closing session");
        self.supervisor.shutdown().await;
    }
}
