//! Event routing - Applies backend events to the launcher state

use tracing::{debug, info, warn};

use super::app_state::LauncherState;
use super::instance::{Instance, InstanceId};
use super::log_buffer::LogTag;
use super::notify::{Notifier, Severity};
use super::progress::{DownloadStatus, Transition};
use super::settings::AttributionPolicy;
use crate::events::{Event, EventKind, EventPayload};

/// What routing an event did to the state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Only a console line was added
    Logged,
    Progress(InstanceId, Transition),
    Completed(InstanceId, Transition),
    Failed(Option<InstanceId>, Transition),
    /// The launch slot was released (None if it was already empty)
    SlotReleased(Option<InstanceId>),
    InstanceSynced { id: InstanceId, replaced: bool },
    /// The event could not be applied
    Dropped(&'static str),
}

/// How an event's subject was determined
#[derive(Debug, Clone, PartialEq, Eq)]
enum Subject {
    Explicit(InstanceId),
    Fallback(InstanceId),
    Unresolved,
}

impl Subject {
    fn id(self) -> Option<InstanceId> {
        match self {
            Self::Explicit(id) | Self::Fallback(id) => Some(id),
            Self::Unresolved => None,
        }
    }
}

/// Applies one event at a time to a [`LauncherState`]
pub struct Router<'a> {
    state: &'a mut LauncherState,
    notifier: &'a Notifier,
    policy: AttributionPolicy,
}

impl<'a> Router<'a> {
    pub fn new(state: &'a mut LauncherState, notifier: &'a Notifier, policy: AttributionPolicy) -> Self {
        Self {
            state,
            notifier,
            policy,
        }
    }

    pub fn route(&mut self, event: &Event) -> Effect {
        let p = &event.payload;
        let effect = match event.kind {
            EventKind::DownloadStatus => self.download_status(p),
            EventKind::DownloadProgress => self.download_progress(p),
            EventKind::DownloadComplete => self.download_complete(p),
            EventKind::DownloadError => self.download_error(p),
            EventKind::LaunchStatus => self.launch_status(p),
            EventKind::GameLog => self.game_log(p),
            EventKind::LaunchError => self.launch_error(p),
            EventKind::LaunchExit => self.end_launch(),
            EventKind::AppLogError => self.app_error(p),
            EventKind::InstanceUpdated => self.instance_updated(p),
        };
        debug!("Routed {} -> {:?}", event.kind, effect);
        effect
    }

    /// `payload.instance_id`, else the current operation. An empty id
    /// counts as absent.
    fn resolve(&self, payload: &EventPayload) -> Subject {
        if let Some(id) = payload.instance_id.as_ref().filter(|id| !id.as_str().is_empty()) {
            return Subject::Explicit(id.clone());
        }
        if self.policy == AttributionPolicy::Strict {
            return Subject::Unresolved;
        }
        match &self.state.current_operation {
            Some(current) => {
                if self.state.outstanding_downloads.len() > 1 {
                    warn!(
                        "Attributing untagged event to {} while {} downloads are outstanding",
                        current,
                        self.state.outstanding_downloads.len()
                    );
                }
                Subject::Fallback(current.clone())
            }
            None => Subject::Unresolved,
        }
    }

    fn log(&mut self, tag: LogTag, text: impl Into<String>) {
        self.state.logs.push_tagged(tag, text);
    }

    fn download_status(&mut self, p: &EventPayload) -> Effect {
        let status = p.status.as_deref().filter(|s| !s.is_empty()).unwrap_or("unknown");
        let tag = LogTag::Download(Some(status.to_uppercase()));
        let message = p.message_or("No message").to_string();
        self.log(tag, message);
        Effect::Logged
    }

    fn download_progress(&mut self, p: &EventPayload) -> Effect {
        let Some(id) = self.resolve(p).id() else {
            return Effect::Dropped("progress event has no instance");
        };
        let current = p.current.unwrap_or(0);
        let total = p.total.unwrap_or(0);

        let transition = self.state.progress.advance(&id, current, total);
        if transition.is_applied() {
            self.log(LogTag::Progress, format!("Progress: {}/{}", current, total));
        } else {
            debug!("Ignoring progress for settled download {}", id);
        }
        Effect::Progress(id, transition)
    }

    fn download_complete(&mut self, p: &EventPayload) -> Effect {
        let Some(id) = self.resolve(p).id() else {
            return Effect::Dropped("completion event has no instance");
        };
        let transition = self.state.progress.complete(&id);
        self.state.clear_current_if(&id);
        info!("Download complete for {}", id);
        Effect::Completed(id, transition)
    }

    fn download_error(&mut self, p: &EventPayload) -> Effect {
        let message = p.display_error("Download failed").to_string();
        self.log(LogTag::Error, message.clone());
        self.notifier
            .toast(Severity::Error, format!("Download failed: {}", message));

        match self.resolve(p).id() {
            Some(id) => {
                let transition = self.state.progress.fail(&id);
                self.state.clear_current_if(&id);
                warn!("Download failed for {}: {}", id, message);
                Effect::Failed(Some(id), transition)
            }
            None => Effect::Failed(
                None,
                Transition::Rejected {
                    from: DownloadStatus::Idle,
                    to: DownloadStatus::Failed,
                },
            ),
        }
    }

    fn launch_status(&mut self, p: &EventPayload) -> Effect {
        self.log(LogTag::System, p.message_or("No message").to_string());
        if p.reports_exit() {
            return self.end_launch();
        }
        Effect::Logged
    }

    fn game_log(&mut self, p: &EventPayload) -> Effect {
        self.log(LogTag::Game, p.message_or("").to_string());
        Effect::Logged
    }

    fn launch_error(&mut self, p: &EventPayload) -> Effect {
        let message = p.display_error("Unknown launch error").to_string();
        self.log(LogTag::Error, message.clone());
        let effect = self.end_launch();
        self.state.console_open = true;
        self.notifier.open_console();
        self.notifier
            .toast(Severity::Error, format!("Launch failed: {}", message));
        effect
    }

    /// Release the slot and return its holder's record to idle.
    ///
    /// Repeated terminal signals find the slot empty and change nothing.
    fn end_launch(&mut self) -> Effect {
        let released = self.state.slot.release();
        if let Some(id) = &released {
            self.state.progress.reset_idle(id);
            self.state.clear_current_if(id);
            info!("Launch of {} ended, slot released", id);
        }
        Effect::SlotReleased(released)
    }

    fn app_error(&mut self, p: &EventPayload) -> Effect {
        self.log(LogTag::AppError, p.display_error("Unknown app error").to_string());
        Effect::Logged
    }

    fn instance_updated(&mut self, p: &EventPayload) -> Effect {
        let Some(meta) = &p.meta else {
            return Effect::Dropped("sync event has no snapshot");
        };
        let instance: Instance = match serde_json::from_value(meta.clone()) {
            Ok(instance) => instance,
            Err(e) => {
                warn!("Ignoring malformed instance snapshot: {}", e);
                return Effect::Dropped("malformed instance snapshot");
            }
        };

        let id = instance.id.clone();
        let replaced = self.state.instances.apply_snapshot(instance.clone());
        if replaced {
            self.notifier.instance_updated(instance);
        }
        Effect::InstanceSynced { id, replaced }
    }
}
