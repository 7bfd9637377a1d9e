//! Events module - Typed payloads of the backend event stream

pub mod legacy;
mod payload;

pub use payload::{DecodeError, Envelope, Event, EventError, EventKind, EventPayload};
