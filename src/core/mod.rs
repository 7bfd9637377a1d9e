//! Core module - Launcher state, event routing, and the orchestrator

mod app_state;
mod instance;
mod launch_slot;
pub mod log_buffer;
mod notify;
mod orchestrator;
pub mod progress;
mod router;
pub mod settings;

pub use app_state::{LauncherState, SharedState, StateSnapshot};
pub use instance::{Account, Instance, InstanceCache, InstanceId, InstanceSettings};
pub use launch_slot::{LaunchSlot, LaunchTicket, SlotError};
pub use log_buffer::{LogBuffer, LogLine, LogTag};
pub use notify::{Notification, Notifier, Severity, UiSignal};
pub use orchestrator::{DownloadOutcome, LaunchOutcome, Orchestrator, Subscription};
pub use progress::{DownloadRecord, DownloadStatus, ProgressTable, Transition};
pub use router::{Effect, Router};
pub use settings::{AttributionPolicy, NotificationLevel, Settings};
