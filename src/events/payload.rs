//! Event payloads pushed by the backend

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::core::InstanceId;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unknown event kind: {0}")]
    UnknownKind(String),
    #[error("malformed event: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("event line is neither an envelope nor a legacy message")]
    Unrecognized,
}

/// The closed set of event kinds the backend emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "download.status")]
    DownloadStatus,
    #[serde(rename = "download.progress")]
    DownloadProgress,
    #[serde(rename = "download.complete")]
    DownloadComplete,
    #[serde(rename = "download.error")]
    DownloadError,
    #[serde(rename = "launch.status")]
    LaunchStatus,
    #[serde(rename = "launch.game.log")]
    GameLog,
    #[serde(rename = "launch.error")]
    LaunchError,
    #[serde(rename = "launch.exit")]
    LaunchExit,
    #[serde(rename = "app.log.error")]
    AppLogError,
    #[serde(rename = "instance.updated")]
    InstanceUpdated,
}

impl EventKind {
    pub const ALL: [EventKind; 10] = [
        EventKind::DownloadStatus,
        EventKind::DownloadProgress,
        EventKind::DownloadComplete,
        EventKind::DownloadError,
        EventKind::LaunchStatus,
        EventKind::GameLog,
        EventKind::LaunchError,
        EventKind::LaunchExit,
        EventKind::AppLogError,
        EventKind::InstanceUpdated,
    ];

    /// Topic name on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DownloadStatus => "download.status",
            Self::DownloadProgress => "download.progress",
            Self::DownloadComplete => "download.complete",
            Self::DownloadError => "download.error",
            Self::LaunchStatus => "launch.status",
            Self::GameLog => "launch.game.log",
            Self::LaunchError => "launch.error",
            Self::LaunchExit => "launch.exit",
            Self::AppLogError => "app.log.error",
            Self::InstanceUpdated => "instance.updated",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| DecodeError::UnknownKind(s.to_string()))
    }
}

/// Structured error attached to a payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

/// One lifecycle occurrence reported by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventPayload {
    /// Provenance only; a value that is not RFC 3339 decodes as `None`
    #[serde(deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    pub source: Option<String>,
    pub instance_id: Option<InstanceId>,
    pub status: Option<String>,
    pub message: Option<String>,
    pub current: Option<u64>,
    pub total: Option<u64>,
    /// Entity snapshot for sync events
    pub meta: Option<Value>,
    pub error: Option<EventError>,
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc)))
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.is_empty())
}

impl EventPayload {
    pub fn with_instance(mut self, id: impl Into<InstanceId>) -> Self {
        self.instance_id = Some(id.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_progress(mut self, current: u64, total: u64) -> Self {
        self.current = Some(current);
        self.total = Some(total);
        self
    }

    pub fn with_error(mut self, error: EventError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Message text, falling back to `fallback`
    pub fn message_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        non_empty(&self.message).unwrap_or(fallback)
    }

    /// Human-readable error: cause, then error message, then payload message
    pub fn display_error<'a>(&'a self, fallback: &'a str) -> &'a str {
        let error = self.error.as_ref();
        error
            .and_then(|e| non_empty(&e.cause))
            .or_else(|| error.map(|e| e.message.as_str()).filter(|m| !m.is_empty()))
            .or_else(|| non_empty(&self.message))
            .unwrap_or(fallback)
    }

    /// Whether a status event reports that the game process exited.
    ///
    /// Only the structured `status` field is consulted.
    pub fn reports_exit(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("exited"))
    }
}

/// A typed event: kind plus payload
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub payload: EventPayload,
}

/// JSON wire form of an [`Event`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub kind: EventKind,
    #[serde(default)]
    pub payload: EventPayload,
}

impl Event {
    pub fn new(kind: EventKind, payload: EventPayload) -> Self {
        Self { kind, payload }
    }

    /// Decode one JSON line.
    ///
    /// Accepts an envelope (`{"kind", "payload"}`) or a legacy message
    /// (`{"event", "data"}`). Legacy messages with no typed counterpart
    /// decode to `Ok(None)`.
    pub fn from_json(line: &str) -> Result<Option<Self>, DecodeError> {
        let value: Value = serde_json::from_str(line)?;
        if let Some(kind) = value.get("kind").and_then(Value::as_str) {
            let kind: EventKind = kind.parse()?;
            let payload = match value.get("payload") {
                Some(p) => serde_json::from_value(p.clone())?,
                None => EventPayload::default(),
            };
            return Ok(Some(Event::new(kind, payload)));
        }
        if let Some(name) = value.get("event").and_then(Value::as_str) {
            let data = value.get("data").cloned().unwrap_or(Value::Null);
            return Ok(super::legacy::normalize(name, &data));
        }
        Err(DecodeError::Unrecognized)
    }

    pub fn to_envelope(&self) -> Envelope {
        Envelope {
            kind: self.kind,
            payload: self.payload.clone(),
        }
    }
}

impl From<Envelope> for Event {
    fn from(env: Envelope) -> Self {
        Event::new(env.kind, env.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_round_trip_through_from_str() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert!(matches!(
            "download.paused".parse::<EventKind>(),
            Err(DecodeError::UnknownKind(_))
        ));
    }

    #[test]
    fn test_payload_decodes_camel_case() {
        let json = r#"{
            "timestamp": "2024-05-01T12:00:00Z",
            "source": "downloader",
            "instanceId": "abc",
            "current": 3,
            "total": 10
        }"#;
        let payload: EventPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.instance_id, Some(InstanceId::from("abc")));
        assert_eq!(payload.current, Some(3));
        assert_eq!(payload.total, Some(10));
        assert!(payload.timestamp.is_some());
    }

    #[test]
    fn test_display_error_precedence() {
        let full = EventPayload::default()
            .with_message("payload msg")
            .with_error(EventError {
                code: "io".into(),
                message: "write failed".into(),
                cause: Some("disk full".into()),
            });
        assert_eq!(full.display_error("fallback"), "disk full");

        let no_cause = EventPayload::default().with_error(EventError {
            code: "io".into(),
            message: "write failed".into(),
            cause: None,
        });
        assert_eq!(no_cause.display_error("fallback"), "write failed");

        let message_only = EventPayload::default().with_message("payload msg");
        assert_eq!(message_only.display_error("fallback"), "payload msg");

        let empty_error = EventPayload::default().with_error(EventError::default());
        assert_eq!(empty_error.display_error("Download failed"), "Download failed");
    }

    #[test]
    fn test_reports_exit_uses_status_only() {
        assert!(EventPayload::default().with_status("Exited").reports_exit());
        assert!(!EventPayload::default()
            .with_message("Game closed successfully")
            .reports_exit());
    }

    #[test]
    fn test_from_json_envelope() {
        let line = r#"{"kind":"download.error","payload":{"instanceId":"z","error":{"code":"io","message":"x","cause":"disk full"}}}"#;
        let event = Event::from_json(line).unwrap().unwrap();
        assert_eq!(event.kind, EventKind::DownloadError);
        assert_eq!(event.payload.display_error(""), "disk full");
    }

    #[test]
    fn test_from_json_envelope_without_payload() {
        let event = Event::from_json(r#"{"kind":"launch.exit"}"#).unwrap().unwrap();
        assert_eq!(event.kind, EventKind::LaunchExit);
        assert_eq!(event.payload, EventPayload::default());
    }

    #[test]
    fn test_bad_timestamp_does_not_reject_event() {
        let event = Event::from_json(
            r#"{"kind":"launch.exit","payload":{"timestamp":"","source":"backend"}}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(event.kind, EventKind::LaunchExit);
        assert_eq!(event.payload.timestamp, None);
        assert_eq!(event.payload.source.as_deref(), Some("backend"));

        let payload: EventPayload =
            serde_json::from_str(r#"{"timestamp": 1714564800, "instanceId": "abc"}"#).unwrap();
        assert_eq!(payload.timestamp, None);
        assert_eq!(payload.instance_id, Some(InstanceId::from("abc")));
    }

    #[test]
    fn test_from_json_rejects_unknown_shapes() {
        assert!(matches!(
            Event::from_json(r#"{"kind":"nope"}"#),
            Err(DecodeError::UnknownKind(_))
        ));
        assert!(matches!(
            Event::from_json(r#"{"hello":1}"#),
            Err(DecodeError::Unrecognized)
        ));
        assert!(matches!(
            Event::from_json("not json"),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_envelope_serializes_kind_as_topic() {
        let event = Event::new(EventKind::GameLog, EventPayload::default().with_message("hi"));
        let json = serde_json::to_value(event.to_envelope()).unwrap();
        assert_eq!(json["kind"], "launch.game.log");
        assert_eq!(json["payload"]["message"], "hi");
    }
}
