// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

//! Outbound notification dispatch. Delivery is best-effort: callers hand a
//! notification to [`dispatch`] after their transaction committed and never
//! observe the outcome.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::models::{ConnectionType, RequestType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum Notification {
    ConnectionRequested {
        request_id: i64,
        requester_id: i64,
        request_type: RequestType,
    },
    ConnectionAccepted {
        request_id: i64,
        accepted_by: i64,
        connection_type: ConnectionType,
    },
}

#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn notify(&self, user_id: i64, notification: Notification) -> anyhow::Result<()>;
}

/// Sends `notification` to `user_id` on a background task. Failures are
/// logged and dropped.
pub fn dispatch(notifier: Arc<dyn Notifier>, user_id: i64, notification: Notification) {
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(user_id, notification).await {
            warn!("Failed to notify user {}: {}", user_id, e);
        }
    });
}

/// Writes notifications to the log; used when no push transport is wired.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, user_id: i64, notification: Notification) -> anyhow::Result<()> {
        info!(user_id, ?notification, "Notification queued");
        Ok(())
    }
}

/// Forwards every notification into an mpsc channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<(i64, Notification)>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(i64, Notification)>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, user_id: i64, notification: Notification) -> anyhow::Result<()> {
        debug!(user_id, "Forwarding notification");
        self.sender
            .send((user_id, notification))
            .map_err(|_| anyhow::anyhow!("notification receiver closed"))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tracing_test::traced_test;

    use super::*;

    struct BrokenTransport;

    #[async_trait]
    impl Notifier for BrokenTransport {
        async fn notify(&self, _user_id: i64, _notification: Notification) -> anyhow::Result<()> {
            anyhow::bail!("push gateway unavailable")
        }
    }

    #[tokio::test]
    async fn dispatch_delivers_in_background() {
        let (notifier, mut receiver) = ChannelNotifier::new();
        let notification = Notification::ConnectionRequested {
            request_id: 1,
            requester_id: 2,
            request_type: RequestType::Follow,
        };
        dispatch(Arc::new(notifier), 3, notification.clone());

        let received = tokio::time::timeout(Duration::from_secs(1), receiver.recv())
            .await
            .unwrap();
        assert_eq!(received, Some((3, notification)));
    }

    #[tokio::test]
    #[traced_test]
    async fn failures_are_logged_not_raised() {
        dispatch(
            Arc::new(BrokenTransport),
            7,
            Notification::ConnectionAccepted {
                request_id: 1,
                accepted_by: 7,
                connection_type: ConnectionType::Stranger,
            },
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(logs_contain("Failed to notify user 7"));
    }

    #[test]
    fn serializes_with_kind_tag() {
        let value = serde_json::to_value(Notification::ConnectionRequested {
            request_id: 5,
            requester_id: 6,
            request_type: RequestType::Stranger,
        })
        .unwrap();
        assert_eq!(value["kind"], "CONNECTION_REQUESTED");
        assert_eq!(value["requesterId"], 6);
    }
}
