//! Notification requests emitted by the registry
//!
//! The engine only decides *when* a "waiting for input" notification should
//! be shown or withdrawn. Delivery is up to the [`Notifier`] implementation.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

use crate::{SessionGroupId, SessionId};

/// Request to show a "waiting for input" notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub session_id: SessionId,
    pub repo_name: String,
    pub group_id: Option<SessionGroupId>,
}

/// Message sent toward the notification gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// The session started waiting
    Request(NotificationRequest),
    /// The session is no longer waiting; withdraw any pending notification
    Cancel { session_id: SessionId },
}

impl Notification {
    pub fn session_id(&self) -> &str {
        match self {
            Notification::Request(req) => &req.session_id,
            Notification::Cancel { session_id } => session_id,
        }
    }
}

/// Fire-and-forget sink for notifications
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Notifier that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification {
            Notification::Request(req) => info!(
                "[agentwatch:notify] {} is waiting for input (session {})",
                req.repo_name, req.session_id
            ),
            Notification::Cancel { session_id } => {
                info!("[agentwatch:notify] session {} is busy again", session_id)
            }
        }
    }
}

/// Notifier that forwards to a channel
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new(tx: UnboundedSender<Notification>) -> Self {
        Self { tx }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        // Receiver gone means nobody is displaying notifications anymore
        let _ = self.tx.send(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_json_shape() {
        let request = Notification::Request(NotificationRequest {
            session_id: "s1".into(),
            repo_name: "proj".into(),
            group_id: Some(3),
        });
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["type"], "request");
        assert_eq!(value["repo_name"], "proj");

        let cancel = Notification::Cancel {
            session_id: "s1".into(),
        };
        assert_eq!(serde_json::to_value(&cancel).unwrap()["type"], "cancel");
        assert_eq!(cancel.session_id(), "s1");
    }

    #[test]
    fn test_channel_notifier_forwards() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let notifier = ChannelNotifier::new(tx);
        notifier.notify(Notification::Cancel {
            session_id: "s2".into(),
        });
        assert_eq!(rx.try_recv().unwrap().session_id(), "s2");
    }
}
