//! Shared, lock-protected progress record of one session.

use std::path::PathBuf;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::types::{SessionId, SessionState, UploadProgress};

/// Tracks a live upload session (thread-safe).
///
/// The session task writes, the engine reads for [`UploadEngine::progress`](crate::UploadEngine::progress).
/// Once a terminal state is recorded, later transitions are ignored, so a
/// late response cannot overwrite a cancellation.
pub struct SessionStatus {
    inner: RwLock<StatusInner>,
}

struct StatusInner {
    id: SessionId,
    state: SessionState,
    content_length: u64,
    bytes_sent: u64,
    remote_destination_path: PathBuf,
    started_at: Instant,
    completed_at: Option<Instant>,
}

impl SessionStatus {
    /// Creates a record in the initiating state.
    pub fn new(id: SessionId, content_length: u64, remote_destination_path: PathBuf) -> Self {
        Self {
            inner: RwLock::new(StatusInner {
                id,
                state: SessionState::Initiating,
                content_length,
                bytes_sent: 0,
                remote_destination_path,
                started_at: Instant::now(),
                completed_at: None,
            }),
        }
    }

    /// Moves to transferring once the session URL is known.
    pub fn start_transfer(&self) {
        let mut s = self.inner.write().unwrap();
        if s.state.is_terminal() {
            return;
        }
        s.state = SessionState::Transferring;
    }

    /// Records the offset acknowledged by the service. Never moves backwards.
    pub fn record_ack(&self, bytes_sent: u64) {
        let mut s = self.inner.write().unwrap();
        if s.state.is_terminal() {
            return;
        }
        s.bytes_sent = s.bytes_sent.max(bytes_sent);
    }

    pub fn complete(&self) {
        let mut s = self.inner.write().unwrap();
        if s.state.is_terminal() {
            return;
        }
        s.state = SessionState::Completed;
        s.bytes_sent = s.content_length;
        s.completed_at = Some(Instant::now());
    }

    pub fn fail(&self) {
        self.finish(SessionState::Failed);
    }

    pub fn cancel(&self) {
        self.finish(SessionState::Cancelled);
    }

    fn finish(&self, state: SessionState) {
        let mut s = self.inner.write().unwrap();
        if s.state.is_terminal() {
            return;
        }
        s.state = state;
        s.completed_at = Some(Instant::now());
    }

    /// Returns current progress.
    pub fn progress(&self) -> UploadProgress {
        let s = self.inner.read().unwrap();
        UploadProgress {
            id: s.id,
            state: s.state,
            bytes_sent: s.bytes_sent,
            content_length: s.content_length,
            remote_destination_path: s.remote_destination_path.clone(),
        }
    }

    pub fn bytes_sent(&self) -> u64 {
        self.inner.read().unwrap().bytes_sent
    }

    /// Time since creation, or total duration once terminal.
    pub fn elapsed(&self) -> Duration {
        let s = self.inner.read().unwrap();
        s.completed_at.unwrap_or_else(Instant::now) - s.started_at
    }
}
