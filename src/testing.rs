//! Test helpers: a scripted in-memory backend.
//!
//! Each call is recorded. Replies are queued per call kind and default to
//! `Ok(())`; a held reply keeps the call pending until the test resolves it.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{oneshot, Notify};

use crate::backend::{BackendError, LauncherBackend};
use crate::core::InstanceId;

/// A call the orchestrator made
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    StartDownload(InstanceId),
    Launch(InstanceId),
    CancelCurrent,
    Stop(InstanceId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    StartDownload,
    Launch,
    CancelCurrent,
    Stop,
}

impl BackendCall {
    pub fn kind(&self) -> CallKind {
        match self {
            Self::StartDownload(_) => CallKind::StartDownload,
            Self::Launch(_) => CallKind::Launch,
            Self::CancelCurrent => CallKind::CancelCurrent,
            Self::Stop(_) => CallKind::Stop,
        }
    }
}

enum Reply {
    Now(Result<(), BackendError>),
    Held(oneshot::Receiver<Result<(), BackendError>>),
}

/// In-memory [`LauncherBackend`] driven by the test
#[derive(Default)]
pub struct ScriptedBackend {
    calls: Mutex<Vec<BackendCall>>,
    replies: Mutex<HashMap<CallKind, VecDeque<Reply>>>,
    called: Notify,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue an immediate reply for the next call of `kind`
    pub fn reply(&self, kind: CallKind, result: Result<(), BackendError>) {
        self.push(kind, Reply::Now(result));
    }

    /// Keep the next call of `kind` pending until the sender resolves it
    pub fn hold(&self, kind: CallKind) -> oneshot::Sender<Result<(), BackendError>> {
        let (tx, rx) = oneshot::channel();
        self.push(kind, Reply::Held(rx));
        tx
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self, kind: CallKind) -> usize {
        self.calls().iter().filter(|c| c.kind() == kind).count()
    }

    /// Wait until at least `n` calls of `kind` were made
    pub async fn wait_for_calls(&self, kind: CallKind, n: usize) {
        loop {
            let notified = self.called.notified();
            if self.call_count(kind) >= n {
                return;
            }
            notified.await;
        }
    }

    fn push(&self, kind: CallKind, reply: Reply) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.entry(kind).or_default().push_back(reply);
        }
    }

    async fn record(&self, call: BackendCall) -> Result<(), BackendError> {
        let kind = call.kind();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        let reply = self
            .replies
            .lock()
            .ok()
            .and_then(|mut r| r.get_mut(&kind).and_then(VecDeque::pop_front));
        self.called.notify_waiters();

        match reply {
            None => Ok(()),
            Some(Reply::Now(result)) => result,
            Some(Reply::Held(rx)) => rx.await.unwrap_or(Err(BackendError::Unavailable)),
        }
    }
}

#[async_trait]
impl LauncherBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn start_download(&self, id: &InstanceId) -> Result<(), BackendError> {
        self.record(BackendCall::StartDownload(id.clone())).await
    }

    async fn launch(&self, id: &InstanceId) -> Result<(), BackendError> {
        self.record(BackendCall::Launch(id.clone())).await
    }

    async fn cancel_current(&self) -> Result<(), BackendError> {
        self.record(BackendCall::CancelCurrent).await
    }

    async fn stop(&self, id: &InstanceId) -> Result<(), BackendError> {
        self.record(BackendCall::Stop(id.clone())).await
    }
}
