//! Launcher state - The explicit, owned state behind the orchestrator

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::error;

use super::instance::{InstanceCache, InstanceId};
use super::launch_slot::LaunchSlot;
use super::log_buffer::LogBuffer;
use super::progress::{DownloadRecord, ProgressTable};
use super::settings::Settings;

/// Everything the orchestrator mutates
#[derive(Debug, Clone)]
pub struct LauncherState {
    /// Per-instance download records
    pub progress: ProgressTable,
    /// Single-flight launch guard
    pub slot: LaunchSlot,
    /// Console lines
    pub logs: LogBuffer,
    /// Operation that untagged events are attributed to
    pub current_operation: Option<InstanceId>,
    /// Downloads whose backend call has not returned yet
    pub outstanding_downloads: HashSet<InstanceId>,
    /// Whether the console view is open
    pub console_open: bool,
    /// Caller-visible instance list
    pub instances: InstanceCache,
}

impl LauncherState {
    pub fn new(settings: &Settings) -> Self {
        let mut settings = settings.clone();
        settings.validate();
        Self {
            progress: ProgressTable::new(),
            slot: LaunchSlot::new(),
            logs: LogBuffer::new(settings.log_capacity),
            current_operation: None,
            outstanding_downloads: HashSet::new(),
            console_open: false,
            instances: InstanceCache::new(),
        }
    }

    /// Clear the current operation if `id` owns it
    pub fn clear_current_if(&mut self, id: &InstanceId) -> bool {
        if self.current_operation.as_ref() == Some(id) {
            self.current_operation = None;
            true
        } else {
            false
        }
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            launching: self.slot.active().cloned(),
            current_operation: self.current_operation.clone(),
            progress: self
                .progress
                .iter()
                .map(|(id, record)| (id.clone(), *record))
                .collect(),
            logs: self.logs.rendered(),
            console_open: self.console_open,
        }
    }
}

/// Read model handed to renderers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub launching: Option<InstanceId>,
    pub current_operation: Option<InstanceId>,
    pub progress: BTreeMap<InstanceId, DownloadRecord>,
    pub logs: Vec<String>,
    pub console_open: bool,
}

/// Thread-safe handle to a [`LauncherState`].
///
/// The lock is never held across an await point, so every mutation runs to
/// completion before any other continuation observes the state.
#[derive(Debug, Clone)]
pub struct SharedState {
    inner: Arc<Mutex<LauncherState>>,
}

impl SharedState {
    pub fn new(state: LauncherState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    /// Lock the state, recovering from a poisoned lock
    pub fn lock(&self) -> MutexGuard<'_, LauncherState> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            error!("Launcher state lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Run `f` with exclusive access to the state
    pub fn with<R>(&self, f: impl FnOnce(&mut LauncherState) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.lock().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log_buffer::LogTag;

    #[test]
    fn test_new_state_uses_log_capacity() {
        let settings = Settings {
            log_capacity: 7,
            ..Default::default()
        };
        let state = LauncherState::new(&settings);
        assert_eq!(state.logs.capacity(), 7);
        assert!(!state.slot.is_occupied());
        assert!(state.progress.is_empty());
    }

    #[test]
    fn test_zero_log_capacity_is_clamped() {
        let settings = Settings {
            log_capacity: 0,
            ..Default::default()
        };
        let mut state = LauncherState::new(&settings);
        assert_eq!(state.logs.capacity(), 1);

        state.logs.push_tagged(LogTag::System, "one");
        state.logs.push_tagged(LogTag::System, "two");
        assert_eq!(state.logs.rendered(), vec!["[SYSTEM] two".to_string()]);
    }

    #[test]
    fn test_clear_current_if_matches_only() {
        let mut state = LauncherState::new(&Settings::default());
        state.current_operation = Some("y".into());

        assert!(!state.clear_current_if(&"x".into()));
        assert_eq!(state.current_operation, Some("y".into()));
        assert!(state.clear_current_if(&"y".into()));
        assert_eq!(state.current_operation, None);
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let shared = SharedState::new(LauncherState::new(&Settings::default()));
        shared.with(|s| {
            s.slot.try_acquire(&"abc".into()).unwrap();
            s.progress.advance(&"abc".into(), 1, 4);
            s.logs.push_tagged(LogTag::System, "hello");
        });

        let snap = shared.snapshot();
        assert_eq!(snap.launching, Some("abc".into()));
        assert_eq!(snap.progress[&InstanceId::from("abc")].current, 1);
        assert_eq!(snap.logs, vec!["[SYSTEM] hello".to_string()]);
    }
}
