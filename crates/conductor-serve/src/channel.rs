// ABOUTME: Send-only abstraction over the duplex client channel
// ABOUTME: Delivery is best-effort; send failures are logged, never propagated

use crate::protocol::Notification;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors delivering a notification to the client.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel closed")]
    Closed,
}

/// Outbound half of the client connection.
///
/// Implementations wrap whatever transport the embedding server uses; the
/// session runtime only ever sends typed notifications through it.
#[async_trait]
pub trait Channel: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<(), ChannelError>;
}

/// Send a notification, logging delivery failures instead of surfacing them.
/// Task supervision must never crash the session over a closed connection.
pub async fn send_or_log(channel: &dyn Channel, notification: Notification) {
    if let Err(err) = channel.send(notification).await {
        tracing::warn!(error = %err, "Failed to deliver notification to client");
    }
}

/// In-process channel backed by an mpsc queue.
///
/// Used by tests and by embedders that bridge notifications onto their own
/// transport.
#[derive(Debug, Clone)]
pub struct LocalChannel {
    tx: mpsc::UnboundedSender<Notification>,
}

impl LocalChannel {
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Channel for LocalChannel {
    async fn send(&self, notification: Notification) -> Result<(), ChannelError> {
        self.tx.send(notification).map_err(|_| ChannelError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_channel_delivers_in_order() {
        let (channel, mut rx) = LocalChannel::pair();
        channel
            .send(Notification::response("system", "first"))
            .await
            .unwrap();
        channel.send(Notification::Complete).await.unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            Notification::response("system", "first")
        );
        assert_eq!(rx.recv().await.unwrap(), Notification::Complete);
    }

    #[tokio::test]
    async fn test_send_fails_after_receiver_dropped() {
        let (channel, rx) = LocalChannel::pair();
        drop(rx);
        let result = channel.send(Notification::Stopped).await;
        assert!(matches!(result, Err(ChannelError::Closed)));
    }

    #[tokio::test]
    async fn test_send_or_log_swallows_failure() {
        let (channel, rx) = LocalChannel::pair();
        drop(rx);
        // Must not panic or propagate.
        send_or_log(&channel, Notification::Stopped).await;
    }
}
