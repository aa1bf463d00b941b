use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tracing::warn;

pub const EVENT_CAPACITY: usize = 64;

/// Notifications emitted by the store and its tick drivers.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimerEvent {
    Halfway {
        timer_id: String,
        name: String,
    },
    Completed {
        timer_id: String,
        name: String,
        completed_at: DateTime<Utc>,
    },
    /// The timer was running when the process stopped and has been loaded paused.
    Interrupted {
        timer_id: String,
        name: String,
    },
}

impl TimerEvent {
    pub fn timer_id(&self) -> &str {
        match self {
            TimerEvent::Halfway { timer_id, .. }
            | TimerEvent::Completed { timer_id, .. }
            | TimerEvent::Interrupted { timer_id, .. } => timer_id,
        }
    }

    pub fn message(&self) -> String {
        match self {
            TimerEvent::Halfway { name, .. } => format!("{name} is halfway done."),
            TimerEvent::Completed { name, .. } => format!("{name} completed!"),
            TimerEvent::Interrupted { name, .. } => {
                format!("{name} was paused because the app restarted.")
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub id: u64,
    pub message: String,
    pub event: TimerEvent,
}

#[derive(Default)]
struct Inbox {
    next_id: u64,
    alerts: Vec<Alert>,
}

/// Keeps every notification until the user dismisses it.
#[derive(Clone, Default)]
pub struct AlertInbox {
    inner: Arc<Mutex<Inbox>>,
}

impl AlertInbox {
    /// Spawns a consumer that files every event received on `rx`.
    pub fn listen(mut rx: broadcast::Receiver<TimerEvent>) -> Self {
        let inbox = Self::default();
        let sink = inbox.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        sink.push(event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "alert inbox fell behind, notifications dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        inbox
    }

    pub async fn push(&self, event: TimerEvent) -> u64 {
        let mut inbox = self.inner.lock().await;
        inbox.next_id += 1;
        let id = inbox.next_id;
        inbox.alerts.push(Alert {
            id,
            message: event.message(),
            event,
        });
        id
    }

    pub async fn pending(&self) -> Vec<Alert> {
        self.inner.lock().await.alerts.clone()
    }

    /// Returns false when no alert has that id.
    pub async fn dismiss(&self, id: u64) -> bool {
        let mut inbox = self.inner.lock().await;
        let before = inbox.alerts.len();
        inbox.alerts.retain(|alert| alert.id != id);
        inbox.alerts.len() != before
    }
}
