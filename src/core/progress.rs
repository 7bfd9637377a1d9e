//! Download progress - Per-instance asset preparation state

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::instance::InstanceId;

/// Download status of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    #[default]
    Idle,
    Downloading,
    Completed,
    Failed,
}

impl DownloadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Progress of one instance's download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub current: u64,
    pub total: u64,
    pub status: DownloadStatus,
}

impl DownloadRecord {
    /// Completed fraction in `[0, 1]`; zero while the total is unknown
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.current as f64 / self.total as f64).clamp(0.0, 1.0)
    }
}

/// Result of asking the table to move a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    Rejected {
        from: DownloadStatus,
        to: DownloadStatus,
    },
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Download records keyed by instance.
///
/// Only `idle -> downloading -> {completed, failed}` and the retry edge back
/// into `downloading` (through [`ProgressTable::begin`]) are reachable, plus
/// the reset to `idle` when a launch ends.
#[derive(Debug, Clone, Default)]
pub struct ProgressTable {
    records: HashMap<InstanceId, DownloadRecord>,
}

impl ProgressTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or retry) a download with zero progress
    pub fn begin(&mut self, id: &InstanceId) -> Transition {
        self.records.insert(
            id.clone(),
            DownloadRecord {
                current: 0,
                total: 0,
                status: DownloadStatus::Downloading,
            },
        );
        Transition::Applied
    }

    /// Record progress counters, creating the record on first sight
    pub fn advance(&mut self, id: &InstanceId, current: u64, total: u64) -> Transition {
        let record = self.records.entry(id.clone()).or_default();
        if record.status.is_terminal() {
            return Transition::Rejected {
                from: record.status,
                to: DownloadStatus::Downloading,
            };
        }
        record.current = current;
        record.total = total;
        record.status = DownloadStatus::Downloading;
        Transition::Applied
    }

    /// Mark a running download as completed
    pub fn complete(&mut self, id: &InstanceId) -> Transition {
        self.finish(id, DownloadStatus::Completed)
    }

    /// Mark a running download as failed
    pub fn fail(&mut self, id: &InstanceId) -> Transition {
        self.finish(id, DownloadStatus::Failed)
    }

    /// Complete only if no event already settled the download.
    ///
    /// The backend call returning is a secondary confirmation, so a status
    /// set by an event always wins.
    pub fn confirm_completed(&mut self, id: &InstanceId) -> Transition {
        self.finish(id, DownloadStatus::Completed)
    }

    /// Put the record back to idle, creating it if needed
    pub fn reset_idle(&mut self, id: &InstanceId) -> Transition {
        self.records.entry(id.clone()).or_default().status = DownloadStatus::Idle;
        Transition::Applied
    }

    fn finish(&mut self, id: &InstanceId, to: DownloadStatus) -> Transition {
        match self.records.get_mut(id) {
            Some(record) if record.status == DownloadStatus::Downloading => {
                record.status = to;
                Transition::Applied
            }
            Some(record) => Transition::Rejected {
                from: record.status,
                to,
            },
            None => Transition::Rejected {
                from: DownloadStatus::Idle,
                to,
            },
        }
    }

    pub fn get(&self, id: &InstanceId) -> Option<&DownloadRecord> {
        self.records.get(id)
    }

    pub fn status(&self, id: &InstanceId) -> DownloadStatus {
        self.records.get(id).map(|r| r.status).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&InstanceId, &DownloadRecord)> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
