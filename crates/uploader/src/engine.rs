//! Upload engine: accepts requests, owns live sessions, routes results.
//!
//! Every accepted request runs as its own Tokio task. The engine keeps a
//! registry of live sessions keyed by [`SessionId`]; removing an entry from
//! that registry is the single point that decides who fires the completion
//! callback, which makes delivery exactly-once even when a cancellation races
//! with the final response.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use docupload_transfer::{ChunkSource, FileChunkSource};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::{ConfigError, UploadErrorKind, UploadFailure};
use crate::service::RemoteUploadService;
use crate::session::{self, SessionContext, UploadSession};
use crate::status::SessionStatus;
use crate::types::{
    CompletionCallback, DocumentEntry, ReadyCallback, SessionId, UploadEvent, UploadOutcome,
    UploadProgress, UploadRequest,
};

/// Entry point for starting, observing and cancelling uploads.
///
/// Upload methods spawn onto the current Tokio runtime and must be called
/// from within one.
pub struct UploadEngine {
    inner: Arc<EngineInner>,
    events_rx: Option<mpsc::Receiver<UploadEvent>>,
}

struct EngineInner {
    service: Arc<dyn RemoteUploadService>,
    source: Arc<dyn ChunkSource>,
    config: EngineConfig,
    next_id: AtomicU64,
    sessions: Mutex<HashMap<SessionId, SessionEntry>>,
    events_tx: mpsc::Sender<UploadEvent>,
}

struct SessionEntry {
    request: Arc<UploadRequest>,
    status: Arc<SessionStatus>,
    cancel: CancellationToken,
    on_complete: CompletionCallback,
}

impl UploadEngine {
    /// Creates an engine reading from the local filesystem with default config.
    pub fn new(service: Arc<dyn RemoteUploadService>) -> Self {
        Self::build(service, Arc::new(FileChunkSource::new()), EngineConfig::default())
    }

    /// Creates an engine with a custom chunk source and configuration.
    pub fn with_config(
        service: Arc<dyn RemoteUploadService>,
        source: Arc<dyn ChunkSource>,
        config: EngineConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(service, source, config))
    }

    fn build(
        service: Arc<dyn RemoteUploadService>,
        source: Arc<dyn ChunkSource>,
        config: EngineConfig,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(config.event_buffer);
        Self {
            inner: Arc::new(EngineInner {
                service,
                source,
                config,
                next_id: AtomicU64::new(1),
                sessions: Mutex::new(HashMap::new()),
                events_tx,
            }),
            events_rx: Some(events_rx),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UploadEvent>> {
        self.events_rx.take()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Overwrites the content of an existing remote document.
    ///
    /// Returns `None` if the local file does not exist; in that case
    /// `on_complete` has already fired with
    /// [`UploadErrorKind::SourceNotFound`] and no network call was made.
    pub fn upload_existing_file(
        &self,
        destination: impl Into<String>,
        remote_path: impl Into<PathBuf>,
        local_path: impl Into<PathBuf>,
        content_type: impl Into<String>,
        content_length: u64,
        on_complete: CompletionCallback,
    ) -> Option<SessionId> {
        let request = UploadRequest::existing_file(
            destination,
            remote_path,
            local_path,
            content_type,
            content_length,
        );
        self.upload(request, on_complete, None)
    }

    /// Creates a new remote document named `title`.
    ///
    /// `on_ready` fires once the session URL is known and before any chunk
    /// is sent, so the caller can register the id for cancellation.
    #[allow(clippy::too_many_arguments)]
    pub fn upload_new_file(
        &self,
        destination: impl Into<String>,
        remote_path: impl Into<PathBuf>,
        local_path: impl Into<PathBuf>,
        title: impl Into<String>,
        content_type: impl Into<String>,
        content_length: u64,
        file_size_hint: u64,
        on_complete: CompletionCallback,
        on_ready: ReadyCallback,
    ) -> Option<SessionId> {
        let request = UploadRequest::new_file(
            destination,
            remote_path,
            local_path,
            title,
            content_type,
            content_length,
            file_size_hint,
        );
        self.upload(request, on_complete, Some(on_ready))
    }

    /// Starts an upload for an arbitrary request.
    pub fn upload(
        &self,
        request: UploadRequest,
        on_complete: CompletionCallback,
        on_ready: Option<ReadyCallback>,
    ) -> Option<SessionId> {
        if !self.inner.source.exists(&request.local_file_path) {
            warn!(
                path = %request.local_file_path.display(),
                "source file not found, upload rejected"
            );
            let _ = self.inner.events_tx.try_send(UploadEvent::Failed {
                id: None,
                error: UploadErrorKind::SourceNotFound,
            });
            on_complete(UploadOutcome::failure(
                &request,
                UploadErrorKind::SourceNotFound,
            ));
            return None;
        }

        let id = SessionId::new(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let request = Arc::new(request);
        let status = Arc::new(SessionStatus::new(
            id,
            request.content_length,
            request.remote_destination_path.clone(),
        ));
        let cancel = CancellationToken::new();

        if let Some(hint) = request.file_size_hint
            && hint != request.content_length
        {
            debug!(
                session = %id,
                declared = request.content_length,
                hint,
                "file size hint differs from declared length"
            );
        }

        self.inner.sessions.lock().unwrap().insert(
            id,
            SessionEntry {
                request: Arc::clone(&request),
                status: Arc::clone(&status),
                cancel: cancel.clone(),
                on_complete,
            },
        );

        info!(
            session = %id,
            mode = ?request.mode,
            remote = %request.remote_destination_path.display(),
            bytes = request.content_length,
            "upload started"
        );

        let upload = UploadSession::new(id, request, self.inner.config.chunk_size);
        let ctx = SessionContext {
            service: Arc::clone(&self.inner.service),
            source: Arc::clone(&self.inner.source),
            status,
            cancel,
            events: self.inner.events_tx.clone(),
            on_ready,
        };

        // The session runs in its own task so a panic in the service or in a
        // host callback still reaches `finish`.
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let result = match tokio::spawn(session::run(upload, ctx)).await {
                Ok(result) => result,
                Err(e) => {
                    error!(session = %id, error = %e, "upload task aborted");
                    Err(UploadFailure::Join(e.to_string()))
                }
            };
            inner.finish(id, result);
        });

        Some(id)
    }

    /// Aborts a live session.
    ///
    /// The completion callback fires with [`UploadErrorKind::Cancelled`] and
    /// no further service calls are made for the session. A call already in
    /// flight is allowed to finish; its response is discarded. Returns
    /// `false` for unknown or already finished sessions.
    pub fn cancel(&self, id: SessionId) -> bool {
        let entry = self.inner.sessions.lock().unwrap().remove(&id);
        match entry {
            Some(entry) => {
                self.inner.abort(id, entry);
                true
            }
            None => {
                debug!(session = %id, "cancel ignored, session not live");
                false
            }
        }
    }

    /// Aborts every live session. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<_> = self.inner.sessions.lock().unwrap().drain().collect();
        let count = drained.len();
        for (id, entry) in drained {
            self.inner.abort(id, entry);
        }
        count
    }

    /// Returns a progress snapshot of a live session.
    pub fn progress(&self, id: SessionId) -> Option<UploadProgress> {
        let sessions = self.inner.sessions.lock().unwrap();
        sessions.get(&id).map(|entry| entry.status.progress())
    }

    /// Ids of all live sessions, in allocation order.
    pub fn active_sessions(&self) -> Vec<SessionId> {
        let sessions = self.inner.sessions.lock().unwrap();
        let mut ids: Vec<_> = sessions.keys().copied().collect();
        ids.sort();
        ids
    }
}

impl EngineInner {
    /// Delivers the terminal result of a session task.
    fn finish(&self, id: SessionId, result: Result<DocumentEntry, UploadFailure>) {
        // A missing entry means cancel() already fired the callback.
        let Some(entry) = self.sessions.lock().unwrap().remove(&id) else {
            debug!(session = %id, "session already cancelled, dropping result");
            return;
        };

        let outcome = match result {
            Ok(document) => {
                entry.status.complete();
                info!(
                    session = %id,
                    document = %document.id,
                    elapsed_ms = entry.status.elapsed().as_millis() as u64,
                    "upload completed"
                );
                let _ = self.events_tx.try_send(UploadEvent::Completed {
                    id,
                    document_id: document.id.clone(),
                });
                UploadOutcome::success(&entry.request, document)
            }
            Err(failure) => {
                let kind = failure.kind();
                entry.status.fail();
                warn!(
                    session = %id,
                    bytes_sent = entry.status.bytes_sent(),
                    error = %failure,
                    "upload failed"
                );
                let _ = self.events_tx.try_send(UploadEvent::Failed {
                    id: Some(id),
                    error: kind,
                });
                UploadOutcome::failure(&entry.request, kind)
            }
        };

        (entry.on_complete)(outcome);
    }

    /// Cancels a session already removed from the registry.
    fn abort(&self, id: SessionId, entry: SessionEntry) {
        entry.cancel.cancel();
        entry.status.cancel();
        info!(
            session = %id,
            bytes_sent = entry.status.bytes_sent(),
            "upload cancelled"
        );
        let _ = self.events_tx.try_send(UploadEvent::Cancelled { id });
        (entry.on_complete)(UploadOutcome::failure(
            &entry.request,
            UploadErrorKind::Cancelled,
        ));
    }
}
