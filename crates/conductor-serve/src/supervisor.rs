// ABOUTME: Single-flight task supervision with cancel-before-replace semantics
// ABOUTME: Observes task outcomes and reports failures over the client channel

use crate::channel::{send_or_log, Channel};
use crate::pool::WorkerPool;
use crate::protocol::Notification;
use conductor_core::{classify, ErrorKind, TaskError};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Lifecycle of a supervised task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Cancelled,
    Failed,
}

struct TaskHandle {
    cancel: CancellationToken,
    join: JoinHandle<TaskState>,
}

/// Supervises at most one task per session.
///
/// All entry points are `&mut self`: mutation is serialized through the
/// session's message-handling loop, so the supervisor itself needs no locks.
/// The spawned task is the single owner of its terminal transition.
pub struct TaskSupervisor {
    channel: Arc<dyn Channel>,
    pool: Arc<Mutex<WorkerPool>>,
    current: Option<TaskHandle>,
}

impl TaskSupervisor {
    pub fn new(channel: Arc<dyn Channel>, pool_capacity: usize) -> Self {
        Self {
            channel,
            pool: Arc::new(Mutex::new(WorkerPool::new(pool_capacity))),
            current: None,
        }
    }

    /// Worker pool handle, shared with task bodies for submitting work.
    pub fn pool(&self) -> Arc<Mutex<WorkerPool>> {
        Arc::clone(&self.pool)
    }

    pub fn has_active_task(&self) -> bool {
        self.current
            .as_ref()
            .map(|task| !task.join.is_finished())
            .unwrap_or(false)
    }

    /// Cancel any existing task, then install `body` as the new current task.
    ///
    /// The previous task's cancellation is fully awaited before the new task
    /// starts, so two current tasks never overlap even under back-to-back
    /// calls.
    pub async fn run<F, Fut>(&mut self, body: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        self.cancel_current().await;

        let cancel = CancellationToken::new();
        let fut = body(cancel.clone());
        let channel = Arc::clone(&self.channel);
        let token = cancel.clone();
        let join = tokio::spawn(async move {
            let result = tokio::select! {
                _ = token.cancelled() => Err(TaskError::Cancelled),
                result = fut => result,
            };
            observe_outcome(channel.as_ref(), result).await
        });

        self.current = Some(TaskHandle { cancel, join });
    }

    /// If a task is active, request cancellation and await its terminal
    /// transition. Always recycles the worker pool afterwards so stop/reset
    /// leave it in a known-fresh state.
    pub async fn cancel_current(&mut self) {
        if let Some(task) = self.current.take() {
            if !task.join.is_finished() {
                tracing::info!("Cancelling current task");
                task.cancel.cancel();
            }
            match task.join.await {
                Ok(state) => {
                    tracing::debug!(state = ?state, "Task reached terminal state");
                }
                Err(err) if err.is_panic() => {
                    tracing::error!(error = %err, "Task panicked during unwind");
                }
                Err(_) => {}
            }
        }
        self.pool.lock().await.recycle();
    }

    /// Explicit user stop request. Acknowledged with `stopped` even when no
    /// task is active, so the client UI is never left waiting.
    pub async fn stop(&mut self) {
        if self.current.is_some() {
            tracing::info!("Stopping current task as per user request");
            self.cancel_current().await;
        } else {
            tracing::info!("No active task to stop");
        }
        send_or_log(self.channel.as_ref(), Notification::Stopped).await;
    }

    /// Cancel any current task and release the pool for good.
    pub async fn shutdown(&mut self) {
        self.cancel_current().await;
        self.pool.lock().await.shutdown();
    }
}

/// Drive a finished task to its terminal state, emitting client notifications
/// for failures. Completion and cancellation are silent.
async fn observe_outcome(channel: &dyn Channel, result: Result<(), TaskError>) -> TaskState {
    let err = match result {
        Ok(()) => return TaskState::Completed,
        Err(TaskError::Cancelled) => {
            tracing::info!("Background task was cancelled");
            return TaskState::Cancelled;
        }
        Err(err) => err,
    };

    let diagnostic = format!(
        "Background task failed with exception: {}: {}",
        err.name(),
        err
    );
    tracing::error!(error = %err, "Background task failed");
    send_or_log(channel, Notification::response("system", &diagnostic)).await;

    let classified = classify(&err);
    match classified.kind {
        ErrorKind::Connection => {
            send_or_log(
                channel,
                Notification::response(
                    "System",
                    format!(
                        "Unsupported model was selected. Server encountered error: {}",
                        classified.message
                    ),
                ),
            )
            .await;
        }
        _ => {
            tracing::error!(message = %classified.message, "Unexpected error in background task");
        }
    }

    // Always leave the client free of its busy state, even if earlier sends
    // failed.
    send_or_log(channel, Notification::Complete).await;
    TaskState::Failed
}
