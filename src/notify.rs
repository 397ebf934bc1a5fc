//! Change notifications, published after a write has committed.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    ScheduledMeal,
    Reservation,
    WasteEntry,
    Feedback,
    Points,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeNotification {
    pub entity: EntityKind,
    pub id: Uuid,
    pub action: ChangeAction,
}

impl ChangeNotification {
    pub fn created(entity: EntityKind, id: Uuid) -> Self {
        Self {
            entity,
            id,
            action: ChangeAction::Created,
        }
    }

    pub fn updated(entity: EntityKind, id: Uuid) -> Self {
        Self {
            entity,
            id,
            action: ChangeAction::Updated,
        }
    }
}

#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<ChangeNotification>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeNotification> {
        self.tx.subscribe()
    }

    /// Fire-and-forget. Having no subscribers is not an error.
    pub fn publish(&self, notification: ChangeNotification) {
        if self.tx.send(notification).is_err() {
            debug!("no notification subscribers");
        }
    }
}

/// Logs every notification until the channel closes.
pub fn spawn_log_subscriber(notifier: &Notifier) -> tokio::task::JoinHandle<()> {
    let mut rx = notifier.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(n) => info!(entity = ?n.entity, id = %n.id, action = ?n.action, "change"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "notification subscriber lagged")
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
