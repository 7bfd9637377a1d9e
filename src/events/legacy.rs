//! Adapter for the untyped event channel used by older backends.
//!
//! Older backends emitted bare strings on camelCase topics and signalled a
//! closed game only through the text of a status message. Everything is
//! converted to typed [`Event`]s here so nothing downstream inspects text.

use serde_json::Value;
use tracing::warn;

use super::payload::{Event, EventError, EventKind, EventPayload};
use crate::core::InstanceId;

/// Status text older backends sent when the game process ended
const LEGACY_CLOSED_TEXT: &str = "Game closed";

const LEGACY_SOURCE: &str = "legacy";

fn text(data: &Value) -> String {
    match data {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn base() -> EventPayload {
    EventPayload {
        source: Some(LEGACY_SOURCE.to_string()),
        ..Default::default()
    }
}

/// Parse the legacy `"current/total"` progress string
fn parse_counts(raw: &str) -> Option<(u64, u64)> {
    let (current, total) = raw.split_once('/')?;
    Some((current.trim().parse().ok()?, total.trim().parse().ok()?))
}

/// Convert a legacy `(topic, data)` message into a typed event
pub fn normalize(name: &str, data: &Value) -> Option<Event> {
    let event = match name {
        "downloadStatus" => Event::new(EventKind::DownloadStatus, base().with_message(text(data))),
        "downloadProgress" => {
            let raw = text(data);
            let Some((current, total)) = parse_counts(&raw) else {
                warn!("Dropping malformed legacy progress counters: {:?}", raw);
                return None;
            };
            Event::new(
                EventKind::DownloadProgress,
                base().with_progress(current, total),
            )
        }
        "downloadComplete" => Event::new(
            EventKind::DownloadComplete,
            base().with_instance(InstanceId::from(text(data))),
        ),
        "launchStatus" => {
            let message = text(data);
            let payload = base().with_message(message.as_str());
            if message.contains(LEGACY_CLOSED_TEXT) {
                Event::new(EventKind::LaunchStatus, payload.with_status("exited"))
            } else {
                Event::new(EventKind::LaunchStatus, payload)
            }
        }
        "gameLog" => Event::new(EventKind::GameLog, base().with_message(text(data))),
        "launchError" => Event::new(
            EventKind::LaunchError,
            base().with_error(EventError {
                code: "launch".to_string(),
                message: text(data),
                cause: None,
            }),
        ),
        "game_exit" => Event::new(EventKind::LaunchExit, base().with_status(text(data))),
        "instance_update" => {
            let mut payload = base().with_meta(data.clone());
            payload.instance_id = data
                .get("id")
                .and_then(Value::as_str)
                .map(InstanceId::from);
            Event::new(EventKind::InstanceUpdated, payload)
        }
        "errorLog" => Event::new(
            EventKind::AppLogError,
            base().with_error(EventError {
                code: "app".to_string(),
                message: text(data),
                cause: None,
            }),
        ),
        _ => return None,
    };
    Some(event)
}
