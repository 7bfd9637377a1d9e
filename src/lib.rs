//! launchdeck - Download and launch orchestration for game instances
//!
//! The backend downloads assets and runs game processes; this crate tracks
//! what it reports. Events from the backend's push channel update the launcher
//! state; toasts and console signals fan out to observers.

pub mod backend;
pub mod core;
pub mod events;
#[doc(hidden)]
pub mod testing;

/// Application name constant
pub const APP_NAME: &str = "launchdeck";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
