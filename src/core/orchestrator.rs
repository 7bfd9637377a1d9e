//! Orchestrator - Drives downloads and launches against the backend
//!
//! Every public operation is fire-and-forget from the caller's perspective:
//! failures end up in the console log and as notifications, and the returned
//! outcome is informational only.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::app_state::{LauncherState, SharedState, StateSnapshot};
use super::instance::{Account, Instance, InstanceId};
use super::launch_slot::SlotError;
use super::log_buffer::LogTag;
use super::notify::{Notifier, Severity, UiSignal};
use super::progress::{DownloadRecord, DownloadStatus, Transition};
use super::router::{Effect, Router};
use super::settings::Settings;
use crate::backend::LauncherBackend;
use crate::events::Event;

/// Capacity of the observer broadcast channel
const UI_SIGNAL_CAPACITY: usize = 256;

/// How a `start_download` call ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The call returned and confirmed completion
    Completed,
    /// The call returned, but an event had already settled the download
    Settled(DownloadStatus),
    /// The call failed
    Failed(String),
}

/// How a `launch_instance` call ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// Another launch holds the slot; nothing was done
    Busy { active: InstanceId },
    /// No account was supplied
    NoAccount,
    /// The backend accepted the launch; the slot is held until an exit event
    Started,
    /// The launch was cancelled on request
    Cancelled,
    Failed(String),
}

/// Coordinates the download/launch lifecycle of instances
#[derive(Clone)]
pub struct Orchestrator {
    state: SharedState,
    backend: Arc<dyn LauncherBackend>,
    notifier: Notifier,
    settings: Arc<Settings>,
}

impl Orchestrator {
    pub fn new(state: LauncherState, backend: Arc<dyn LauncherBackend>, mut settings: Settings) -> Self {
        settings.validate();
        let notifier = Notifier::new(settings.notification_level, UI_SIGNAL_CAPACITY);
        Self {
            state: SharedState::new(state),
            backend,
            notifier,
            settings: Arc::new(settings),
        }
    }

    /// Subscribe to toasts and console signals
    pub fn subscribe_ui(&self) -> broadcast::Receiver<UiSignal> {
        self.notifier.subscribe()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Start (or retry) the asset download of an instance
    pub async fn start_download(&self, id: &InstanceId) -> DownloadOutcome {
        let open_console = self.settings.open_console_on_download;
        self.state.with(|s| {
            s.progress.begin(id);
            s.current_operation = Some(id.clone());
            s.outstanding_downloads.insert(id.clone());
            if open_console {
                s.console_open = true;
            }
            s.logs.push_tagged(
                LogTag::Command,
                format!("Starting download for instance {}...", id),
            );
        });
        if open_console {
            self.notifier.open_console();
        }
        self.notifier.state_changed();
        info!("Starting download for {} via {} backend", id, self.backend.name());

        let result = self.backend.start_download(id).await;

        let (outcome, notify) = self.state.with(|s| {
            let settled = match &result {
                Ok(()) => match s.progress.confirm_completed(id) {
                    Transition::Applied => (DownloadOutcome::Completed, false),
                    Transition::Rejected { from, .. } => (DownloadOutcome::Settled(from), false),
                },
                Err(e) => {
                    let message = e.to_string();
                    s.logs
                        .push_tagged(LogTag::Error, format!("Download failed: {}", message));
                    // A download.error event may already have told the user
                    let already_failed = s.progress.status(id) == DownloadStatus::Failed;
                    s.progress.fail(id);
                    (DownloadOutcome::Failed(message), !already_failed)
                }
            };
            s.outstanding_downloads.remove(id);
            s.clear_current_if(id);
            settled
        });

        match &outcome {
            DownloadOutcome::Failed(message) => {
                error!("Download for {} failed: {}", id, message);
                if notify {
                    self.notifier
                        .toast(Severity::Error, format!("Download failed: {}", message));
                }
            }
            other => info!("Download call for {} returned: {:?}", id, other),
        }
        self.notifier.state_changed();
        outcome
    }

    /// Launch an instance under `account`.
    ///
    /// Only one launch may be in flight; a call while the slot is occupied is
    /// a silent no-op.
    pub async fn launch_instance(&self, id: &InstanceId, account: Option<&Account>) -> LaunchOutcome {
        let entered = self.state.with(|s| {
            if let Some(active) = s.slot.active() {
                return Err(LaunchOutcome::Busy {
                    active: active.clone(),
                });
            }
            if account.is_none() {
                s.logs.push_tagged(LogTag::Error, "No account selected!");
                s.console_open = true;
                return Err(LaunchOutcome::NoAccount);
            }
            let ticket = s
                .slot
                .try_acquire(id)
                .map_err(|SlotError::Occupied { active }| LaunchOutcome::Busy { active })?;
            s.current_operation = Some(id.clone());
            s.logs.clear();
            s.console_open = true;
            s.logs
                .push_tagged(LogTag::Command, format!("Launching Instance {}...", id));
            Ok(ticket)
        });

        let ticket = match entered {
            Ok(ticket) => ticket,
            Err(LaunchOutcome::NoAccount) => {
                warn!("Refusing to launch {} without an account", id);
                self.notifier.toast(
                    Severity::Error,
                    "No account selected! Please select an account first.",
                );
                self.notifier.open_console();
                self.notifier.state_changed();
                return LaunchOutcome::NoAccount;
            }
            Err(busy) => {
                debug!("Ignoring launch of {}: {:?}", id, busy);
                return busy;
            }
        };

        self.notifier.open_console();
        self.notifier.state_changed();
        if let Some(account) = account {
            info!("Launching {} as {}", id, account.username);
        }

        let result = self.backend.launch(id).await;

        let outcome = self.state.with(|s| {
            // A relaunch of the same instance took over while this call was pending
            let superseded = s.slot.active() == Some(id) && !s.slot.holds(ticket);
            let outcome = match result {
                Ok(()) => LaunchOutcome::Started,
                Err(e) if e.is_cancelled() => {
                    s.logs.push_tagged(LogTag::System, "Launch cancelled.");
                    s.slot.release_if(ticket);
                    LaunchOutcome::Cancelled
                }
                Err(e) => {
                    s.logs
                        .push_tagged(LogTag::Fatal, format!("Sequence aborted: {}", e));
                    s.slot.release_if(ticket);
                    LaunchOutcome::Failed(e.to_string())
                }
            };
            if !superseded {
                // A launch abort is not a download failure
                s.progress.reset_idle(id);
                s.clear_current_if(id);
            }
            outcome
        });

        match &outcome {
            LaunchOutcome::Cancelled => {
                info!("Launch of {} cancelled", id);
                self.notifier.toast(Severity::Info, "Launch cancelled.");
            }
            LaunchOutcome::Failed(message) => {
                error!("Launch of {} failed: {}", id, message);
                self.notifier
                    .toast(Severity::Error, format!("Launch failed: {}", message));
            }
            _ => info!("Launch call for {} returned, waiting for exit event", id),
        }
        self.notifier.state_changed();
        outcome
    }

    /// Ask the backend to stop a running instance.
    ///
    /// The slot is released only once the exit arrives as an event.
    pub async fn stop_instance(&self, id: &InstanceId) -> bool {
        self.state.with(|s| {
            s.logs
                .push_tagged(LogTag::Command, format!("Stopping Instance {}...", id))
        });
        self.notifier.state_changed();

        match self.backend.stop(id).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to stop {}: {}", id, e);
                self.state.with(|s| {
                    s.logs
                        .push_tagged(LogTag::Error, format!("Failed to stop instance: {}", e))
                });
                self.notifier
                    .toast(Severity::Error, format!("Failed to stop instance: {}", e));
                self.notifier.state_changed();
                false
            }
        }
    }

    /// Cancel the in-flight preparation of the instance holding the slot.
    ///
    /// The slot is single-flight, so the backend's current operation is the
    /// slot holder's. No-op when nothing is launching.
    pub async fn stop_launch(&self) -> bool {
        let Some(active) = self.state.with(|s| s.slot.active().cloned()) else {
            debug!("Nothing to cancel, launch slot is empty");
            return false;
        };
        self.state.with(|s| {
            s.logs
                .push_tagged(LogTag::Command, format!("Cancelling launch of {}...", active))
        });
        self.notifier.state_changed();

        match self.backend.cancel_current().await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to cancel launch of {}: {}", active, e);
                self.state.with(|s| {
                    s.logs
                        .push_tagged(LogTag::Error, format!("Failed to cancel launch: {}", e))
                });
                self.notifier
                    .toast(Severity::Error, format!("Failed to cancel launch: {}", e));
                self.notifier.state_changed();
                false
            }
        }
    }

    /// Apply one backend event
    pub fn handle_event(&self, event: &Event) -> Effect {
        let effect = self.state.with(|s| {
            Router::new(s, &self.notifier, self.settings.attribution).route(event)
        });
        self.notifier.state_changed();
        effect
    }

    /// A channel sized for the event stream
    pub fn event_channel(&self) -> (mpsc::Sender<Event>, mpsc::Receiver<Event>) {
        mpsc::channel(self.settings.event_channel_capacity)
    }

    /// Consume `rx` in delivery order until it closes or the subscription
    /// is shut down
    pub fn attach(&self, mut rx: mpsc::Receiver<Event>) -> Subscription {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let orchestrator = self.clone();

        let handle = tokio::spawn(async move {
            let mut routed = 0usize;
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => {
                        // Apply what was already delivered before stopping
                        while let Ok(event) = rx.try_recv() {
                            orchestrator.handle_event(&event);
                            routed += 1;
                        }
                        break;
                    }
                    event = rx.recv() => match event {
                        Some(event) => {
                            orchestrator.handle_event(&event);
                            routed += 1;
                        }
                        None => break,
                    },
                }
            }
            debug!("Event subscription ended after {} events", routed);
            routed
        });

        info!("Attached to backend event stream");
        Subscription {
            stop: Some(stop_tx),
            handle: Some(handle),
        }
    }

    pub fn toggle_console(&self) -> bool {
        let open = self.state.with(|s| {
            s.console_open = !s.console_open;
            s.console_open
        });
        self.signal_console(open);
        open
    }

    pub fn set_console_open(&self, open: bool) {
        self.state.with(|s| s.console_open = open);
        self.signal_console(open);
    }

    fn signal_console(&self, open: bool) {
        if open {
            self.notifier.open_console();
        } else {
            self.notifier.close_console();
        }
    }

    /// Replace the instance list after a refresh
    pub fn replace_instances(&self, instances: Vec<Instance>) {
        self.state.with(|s| s.instances.replace_all(instances));
        self.notifier.state_changed();
    }

    pub fn instances(&self) -> Vec<Instance> {
        self.state.with(|s| s.instances.iter().cloned().collect())
    }

    pub fn launching(&self) -> Option<InstanceId> {
        self.state.with(|s| s.slot.active().cloned())
    }

    pub fn download_record(&self, id: &InstanceId) -> Option<DownloadRecord> {
        self.state.with(|s| s.progress.get(id).copied())
    }

    pub fn logs(&self) -> Vec<String> {
        self.state.with(|s| s.logs.rendered())
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.state.snapshot()
    }

    /// Number of toasts raised so far
    pub fn toasts_raised(&self) -> usize {
        self.notifier.toasts_raised()
    }
}

/// Handle to a running event subscription.
///
/// Dropping it aborts the ingestion task; [`Subscription::shutdown`] stops it
/// after applying already-delivered events.
pub struct Subscription {
    stop: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<usize>>,
}

impl Subscription {
    /// Stop ingesting and return the number of events routed
    pub async fn shutdown(mut self) -> usize {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        match self.handle.take() {
            Some(handle) => handle.await.unwrap_or_else(|e| {
                warn!("Event subscription task failed: {}", e);
                0
            }),
            None => 0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map(|h| h.is_finished()).unwrap_or(true)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
