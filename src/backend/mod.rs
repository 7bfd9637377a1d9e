//! Backend boundary - Remote calls into the download/launch service

use async_trait::async_trait;
use thiserror::Error;

use crate::core::InstanceId;

/// Failure of a remote call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The operation was cancelled on request
    #[error("cancelled")]
    Cancelled,
    #[error("instance not found: {0}")]
    NotFound(InstanceId),
    #[error("{0}")]
    Rejected(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("backend unavailable")]
    Unavailable,
}

impl BackendError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// The service that downloads assets and runs game processes.
///
/// Calls report progress through the event stream; their return value only
/// says whether the request itself succeeded. `launch` may stay pending
/// until the spawned process reports back.
#[async_trait]
pub trait LauncherBackend: Send + Sync {
    fn name(&self) -> &'static str;
    async fn start_download(&self, id: &InstanceId) -> Result<(), BackendError>;
    async fn launch(&self, id: &InstanceId) -> Result<(), BackendError>;
    /// Cancel the in-flight preparation
    async fn cancel_current(&self) -> Result<(), BackendError>;
    async fn stop(&self, id: &InstanceId) -> Result<(), BackendError>;
}

/// Backend for offline use (event replay); every call is refused
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedBackend;

#[async_trait]
impl LauncherBackend for DetachedBackend {
    fn name(&self) -> &'static str {
        "detached"
    }

    async fn start_download(&self, _id: &InstanceId) -> Result<(), BackendError> {
        Err(BackendError::Unavailable)
    }

    async fn launch(&self, _id: &InstanceId) -> Result<(), BackendError> {
        Err(BackendError::Unavailable)
    }

    async fn cancel_current(&self) -> Result<(), BackendError> {
        Err(BackendError::Unavailable)
    }

    async fn stop(&self, _id: &InstanceId) -> Result<(), BackendError> {
        Err(BackendError::Unavailable)
    }
}
