//! Observer notifications - Toasts and console signals for the display surface

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use super::instance::Instance;
use super::settings::NotificationLevel;

/// Severity of a transient notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Error,
}

/// A transient, user-visible message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub severity: Severity,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Signal delivered to display observers
#[derive(Debug, Clone)]
pub enum UiSignal {
    Toast(Notification),
    ConsoleOpened,
    ConsoleClosed,
    InstanceUpdated(Instance),
    /// Launcher state changed; re-render from a fresh snapshot
    StateChanged,
}

/// Fan-out of [`UiSignal`]s to any number of observers
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<UiSignal>,
    level: NotificationLevel,
    toasts_raised: Arc<AtomicUsize>,
}

impl Notifier {
    pub fn new(level: NotificationLevel, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            level,
            toasts_raised: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiSignal> {
        self.tx.subscribe()
    }

    /// Raise a toast unless the notification level filters it out.
    ///
    /// Returns whether the toast was raised.
    pub fn toast(&self, severity: Severity, message: impl Into<String>) -> bool {
        let allowed = match self.level {
            NotificationLevel::All => true,
            NotificationLevel::Important => severity == Severity::Error,
            NotificationLevel::None => false,
        };
        let message = message.into();
        if !allowed {
            debug!("Suppressed {:?} notification: {}", severity, message);
            return false;
        }

        self.toasts_raised.fetch_add(1, Ordering::Relaxed);
        self.send(UiSignal::Toast(Notification {
            id: Uuid::new_v4(),
            severity,
            message,
            at: Utc::now(),
        }));
        true
    }

    pub fn open_console(&self) {
        self.send(UiSignal::ConsoleOpened);
    }

    pub fn close_console(&self) {
        self.send(UiSignal::ConsoleClosed);
    }

    pub fn instance_updated(&self, instance: Instance) {
        self.send(UiSignal::InstanceUpdated(instance));
    }

    pub fn state_changed(&self) {
        self.send(UiSignal::StateChanged);
    }

    /// Number of toasts raised since creation
    pub fn toasts_raised(&self) -> usize {
        self.toasts_raised.load(Ordering::Relaxed)
    }

    fn send(&self, signal: UiSignal) {
        // No observers attached is fine
        let _ = self.tx.send(signal);
    }
}
