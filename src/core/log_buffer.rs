//! Bounded buffer of human-readable console lines

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Default maximum number of lines kept for the console
pub const DEFAULT_LOG_CAPACITY: usize = 1000;

/// Where a console line came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LogTag {
    Command,
    /// Backend download status, carrying the upper-cased status word
    Download(Option<String>),
    Progress,
    System,
    Game,
    Error,
    AppError,
    Fatal,
}

impl fmt::Display for LogTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command => f.write_str("[COMMAND]"),
            Self::Download(Some(status)) => write!(f, "[DOWNLOAD][{}]", status),
            Self::Download(None) | Self::Progress => f.write_str("[DOWNLOAD]"),
            Self::System => f.write_str("[SYSTEM]"),
            Self::Game => f.write_str("[GAME]"),
            Self::Error => f.write_str("[ERROR]"),
            Self::AppError => f.write_str("[APP ERROR]"),
            Self::Fatal => f.write_str("[FATAL]"),
        }
    }
}

/// One console line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogLine {
    pub tag: LogTag,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl LogLine {
    pub fn new(tag: LogTag, text: impl Into<String>) -> Self {
        Self {
            tag,
            text: text.into(),
            at: Utc::now(),
        }
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tag, self.text)
    }
}

/// Append-only line buffer with FIFO eviction.
///
/// When an append pushes the length past capacity, the overflow is dropped
/// from the front in a single step.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    lines: VecDeque<LogLine>,
    capacity: usize,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            capacity,
        }
    }

    pub fn push(&mut self, line: LogLine) {
        if self.capacity == 0 {
            return;
        }
        self.lines.push_back(line);
        if self.lines.len() > self.capacity {
            let overflow = self.lines.len() - self.capacity;
            self.lines.drain(..overflow);
        }
    }

    pub fn push_tagged(&mut self, tag: LogTag, text: impl Into<String>) {
        self.push(LogLine::new(tag, text));
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn lines(&self) -> impl Iterator<Item = &LogLine> {
        self.lines.iter()
    }

    /// Lines formatted for display
    pub fn rendered(&self) -> Vec<String> {
        self.lines.iter().map(ToString::to_string).collect()
    }

    /// Join all rendered lines with newlines
    pub fn as_string(&self) -> String {
        self.rendered().join("\n")
    }
}
