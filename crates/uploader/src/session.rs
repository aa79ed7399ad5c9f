//! Per-file upload state machine and its async driver.
//!
//! [`UploadSession`] holds no I/O: each `on_*` transition consumes one
//! service response and returns the next [`Step`]. [`run`] executes those
//! steps against the service and the chunk source, one call at a time.

use std::path::PathBuf;
use std::sync::Arc;

use docupload_transfer::{ByteRange, ChunkPlan, ChunkSource, TransferError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{ServiceError, UploadFailure};
use crate::service::{
    InitiateUploadParams, RemoteUploadService, ResumeUploadParams, ResumeUploadResponse,
};
use crate::status::SessionStatus;
use crate::types::{DocumentEntry, ReadyCallback, SessionId, SessionState, UploadEvent, UploadRequest};

/// What the driver must do next.
#[derive(Debug)]
pub enum Step {
    /// Read and send this range.
    Resume(ByteRange),
    /// The session reached a terminal state.
    Finished(Result<DocumentEntry, UploadFailure>),
}

/// State of one upload, from initiation to a terminal state.
#[derive(Debug)]
pub struct UploadSession {
    id: SessionId,
    request: Arc<UploadRequest>,
    plan: ChunkPlan,
    state: SessionState,
    upload_location: String,
    bytes_sent: u64,
    chunks_sent: u64,
}

impl UploadSession {
    /// Creates a session in the initiating state.
    pub fn new(id: SessionId, request: Arc<UploadRequest>, chunk_size: usize) -> Self {
        let plan = ChunkPlan::new(request.content_length, chunk_size);
        Self {
            id,
            request,
            plan,
            state: SessionState::Initiating,
            upload_location: String::new(),
            bytes_sent: 0,
            chunks_sent: 0,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn request(&self) -> &UploadRequest {
        &self.request
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Session URL; empty until initiation succeeds.
    pub fn upload_location(&self) -> &str {
        &self.upload_location
    }

    /// Bytes acknowledged by the service so far.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Parameters for the single initiate call.
    pub fn initiate_params(&self) -> InitiateUploadParams {
        InitiateUploadParams {
            mode: self.request.mode,
            title: self.request.title.clone(),
            content_type: self.request.content_type.clone(),
            content_length: self.request.content_length,
            upload_location: self.request.remote_parent_location.clone(),
            remote_destination_path: self.request.remote_destination_path.clone(),
        }
    }

    /// Parameters for sending `data` as `range`.
    pub fn resume_params(&self, range: ByteRange, data: Vec<u8>) -> ResumeUploadParams {
        ResumeUploadParams {
            mode: self.request.mode,
            upload_location: self.upload_location.clone(),
            range,
            content_type: self.request.content_type.clone(),
            content_length: self.request.content_length,
            data,
            remote_destination_path: self.request.remote_destination_path.clone(),
        }
    }

    /// Consumes the initiate response.
    pub fn on_initiated(&mut self, result: Result<String, ServiceError>) -> Step {
        if self.state != SessionState::Initiating {
            return self.finish(Err(UploadFailure::Protocol(format!(
                "initiate response in state {:?}",
                self.state
            ))));
        }

        match result {
            Ok(location) if location.is_empty() => self.finish(Err(UploadFailure::Initiate(
                ServiceError::MalformedResponse("empty upload location".into()),
            ))),
            Ok(location) => {
                debug!(session = %self.id, location = %location, "upload session initiated");
                self.upload_location = location;
                self.state = SessionState::Transferring;
                self.next_chunk()
            }
            Err(e) => self.finish(Err(UploadFailure::Initiate(e))),
        }
    }

    /// Consumes the response to the resume call that sent `range`.
    pub fn on_chunk_sent(
        &mut self,
        range: ByteRange,
        result: Result<ResumeUploadResponse, ServiceError>,
    ) -> Step {
        if self.state != SessionState::Transferring {
            return self.finish(Err(UploadFailure::Protocol(format!(
                "chunk response in state {:?}",
                self.state
            ))));
        }
        self.chunks_sent += 1;

        match result {
            Ok(ResumeUploadResponse::Complete(document)) => {
                self.bytes_sent = self.request.content_length;
                self.finish(Ok(document))
            }
            Ok(ResumeUploadResponse::Incomplete { next_offset }) => {
                let length = self.request.content_length;
                if next_offset <= self.bytes_sent || next_offset > range.end() || next_offset >= length
                {
                    return self.finish(Err(UploadFailure::Protocol(format!(
                        "service acknowledged offset {next_offset} after sending {range} \
                         (previous offset {}, length {length})",
                        self.bytes_sent
                    ))));
                }
                self.bytes_sent = next_offset;
                self.next_chunk()
            }
            Err(e) => self.finish(Err(UploadFailure::Resume(e))),
        }
    }

    /// Consumes a local read failure for the pending chunk.
    pub fn on_read_failed(&mut self, err: TransferError) -> Step {
        self.finish(Err(UploadFailure::Read(err)))
    }

    /// Marks the session cancelled. No further steps are produced.
    pub fn on_cancelled(&mut self) -> Step {
        self.finish(Err(UploadFailure::Cancelled))
    }

    fn next_chunk(&mut self) -> Step {
        match self.plan.range_at(self.bytes_sent) {
            Ok(range) => Step::Resume(range),
            Err(e) => self.finish(Err(UploadFailure::Read(e))),
        }
    }

    fn finish(&mut self, result: Result<DocumentEntry, UploadFailure>) -> Step {
        self.state = match &result {
            Ok(_) => SessionState::Completed,
            Err(UploadFailure::Cancelled) => SessionState::Cancelled,
            Err(_) => SessionState::Failed,
        };
        debug!(
            session = %self.id,
            state = ?self.state,
            chunks = self.chunks_sent,
            bytes_sent = self.bytes_sent,
            "session finished"
        );
        Step::Finished(result)
    }
}

/// Collaborators a running session needs.
pub(crate) struct SessionContext {
    pub service: Arc<dyn RemoteUploadService>,
    pub source: Arc<dyn ChunkSource>,
    pub status: Arc<SessionStatus>,
    pub cancel: CancellationToken,
    pub events: mpsc::Sender<UploadEvent>,
    pub on_ready: Option<ReadyCallback>,
}

/// Drives `session` to a terminal state.
///
/// Cancellation is checked before every outbound call and after every
/// response; a response that arrives after cancellation is discarded.
pub(crate) async fn run(
    mut session: UploadSession,
    mut ctx: SessionContext,
) -> Result<DocumentEntry, UploadFailure> {
    let id = session.id();
    let mut on_ready = ctx.on_ready.take();

    if ctx.cancel.is_cancelled() {
        return finished(session.on_cancelled());
    }

    let result = ctx
        .service
        .initiate_upload(session.initiate_params())
        .await;
    if ctx.cancel.is_cancelled() {
        debug!(session = %id, "discarding initiate response after cancellation");
        return finished(session.on_cancelled());
    }

    let mut step = session.on_initiated(result);

    if matches!(step, Step::Resume(_)) {
        ctx.status.start_transfer();
        // A cancel may have fired the completion callback in the meantime;
        // ready must never follow it.
        if ctx.cancel.is_cancelled() {
            return finished(session.on_cancelled());
        }
        let _ = ctx.events.try_send(UploadEvent::Ready { id });
        if let Some(on_ready) = on_ready.take() {
            on_ready(id);
        }
    }

    loop {
        let range = match step {
            Step::Finished(result) => return result,
            Step::Resume(range) => range,
        };

        if ctx.cancel.is_cancelled() {
            return finished(session.on_cancelled());
        }

        let path = session.request().local_file_path.clone();
        let data = match read_chunk(Arc::clone(&ctx.source), path, range).await {
            Ok(data) => data,
            Err(UploadFailure::Read(e)) => {
                warn!(session = %id, range = %range, error = %e, "chunk read failed");
                step = session.on_read_failed(e);
                continue;
            }
            Err(e) => return Err(e),
        };

        if ctx.cancel.is_cancelled() {
            return finished(session.on_cancelled());
        }

        debug!(
            session = %id,
            range = %range,
            bytes = data.len(),
            "sending chunk"
        );
        let result = ctx
            .service
            .resume_upload(session.resume_params(range, data))
            .await;
        if ctx.cancel.is_cancelled() {
            debug!(session = %id, "discarding chunk response after cancellation");
            return finished(session.on_cancelled());
        }

        step = session.on_chunk_sent(range, result);

        if matches!(step, Step::Resume(_)) {
            ctx.status.record_ack(session.bytes_sent());
            let _ = ctx.events.try_send(UploadEvent::Progress {
                id,
                bytes_sent: session.bytes_sent(),
                content_length: session.request().content_length,
            });
        }
    }
}

/// Reads `range` on the blocking pool.
async fn read_chunk(
    source: Arc<dyn ChunkSource>,
    path: PathBuf,
    range: ByteRange,
) -> Result<Vec<u8>, UploadFailure> {
    let data = tokio::task::spawn_blocking(move || source.read(&path, range))
        .await
        .map_err(|e| UploadFailure::Join(e.to_string()))??;
    Ok(data)
}

fn finished(step: Step) -> Result<DocumentEntry, UploadFailure> {
    match step {
        Step::Finished(result) => result,
        Step::Resume(range) => Err(UploadFailure::Protocol(format!(
            "session stopped with chunk {range} pending"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UploadMode;

    const CHUNK: usize = 10;

    fn doc() -> DocumentEntry {
        DocumentEntry {
            id: "file:dummy_id".into(),
            title: "Hello world".into(),
            content_url: None,
            updated: None,
            size: None,
        }
    }

    fn session_for(length: u64) -> UploadSession {
        let request = UploadRequest::existing_file(
            "http://test/initial",
            "drive/dummy.txt",
            "/tmp/dummy.txt",
            "text/plain",
            length,
        );
        UploadSession::new(SessionId::new(1), Arc::new(request), CHUNK)
    }

    fn expect_resume(step: Step) -> ByteRange {
        match step {
            Step::Resume(range) => range,
            Step::Finished(r) => panic!("expected resume, got finished: {r:?}"),
        }
    }

    fn expect_failure(step: Step) -> UploadFailure {
        match step {
            Step::Finished(Err(e)) => e,
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn initiate_params_follow_request() {
        let s = session_for(25);
        let p = s.initiate_params();
        assert_eq!(p.mode, UploadMode::ExistingFile);
        assert!(p.title.is_none());
        assert_eq!(p.content_length, 25);
        assert_eq!(p.upload_location, "http://test/initial");
    }

    #[test]
    fn full_transfer_walks_the_plan() {
        let mut s = session_for(25);
        let r = expect_resume(s.on_initiated(Ok("http://test/upload_location".into())));
        assert_eq!(s.state(), SessionState::Transferring);
        assert_eq!(s.upload_location(), "http://test/upload_location");
        assert_eq!(r, ByteRange::new(0, 10).unwrap());

        let r = expect_resume(s.on_chunk_sent(r, Ok(ResumeUploadResponse::Incomplete { next_offset: 10 })));
        assert_eq!(r, ByteRange::new(10, 20).unwrap());
        assert_eq!(s.bytes_sent(), 10);

        let r = expect_resume(s.on_chunk_sent(r, Ok(ResumeUploadResponse::Incomplete { next_offset: 20 })));
        assert_eq!(r, ByteRange::new(20, 25).unwrap());

        match s.on_chunk_sent(r, Ok(ResumeUploadResponse::Complete(doc()))) {
            Step::Finished(Ok(d)) => assert_eq!(d.id, "file:dummy_id"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(s.state(), SessionState::Completed);
        assert_eq!(s.bytes_sent(), 25);
        assert_eq!(s.chunks_sent, 3);
    }

    #[test]
    fn zero_length_sends_one_empty_chunk() {
        let mut s = session_for(0);
        let r = expect_resume(s.on_initiated(Ok("u".into())));
        assert!(r.is_empty());
        assert_eq!(r.start(), 0);
        assert!(matches!(
            s.on_chunk_sent(r, Ok(ResumeUploadResponse::Complete(doc()))),
            Step::Finished(Ok(_))
        ));
    }

    #[test]
    fn partial_ack_resends_from_service_offset() {
        let mut s = session_for(25);
        let r = expect_resume(s.on_initiated(Ok("u".into())));
        let r = expect_resume(s.on_chunk_sent(r, Ok(ResumeUploadResponse::Incomplete { next_offset: 7 })));
        assert_eq!(r, ByteRange::new(7, 17).unwrap());
    }

    #[test]
    fn initiate_failure() {
        let mut s = session_for(25);
        let e = expect_failure(s.on_initiated(Err(ServiceError::NoConnection("down".into()))));
        assert!(matches!(e, UploadFailure::Initiate(_)));
        assert_eq!(s.state(), SessionState::Failed);
        assert!(s.upload_location().is_empty());
    }

    #[test]
    fn empty_location_is_initiate_failure() {
        let mut s = session_for(25);
        let e = expect_failure(s.on_initiated(Ok(String::new())));
        assert!(matches!(e, UploadFailure::Initiate(ServiceError::MalformedResponse(_))));
    }

    #[test]
    fn resume_failure() {
        let mut s = session_for(25);
        let r = expect_resume(s.on_initiated(Ok("u".into())));
        let e = expect_failure(s.on_chunk_sent(r, Err(ServiceError::NoConnection("down".into()))));
        assert!(matches!(e, UploadFailure::Resume(_)));
        assert_eq!(s.state(), SessionState::Failed);
    }

    #[test]
    fn offset_that_does_not_advance_is_rejected() {
        let mut s = session_for(25);
        let r = expect_resume(s.on_initiated(Ok("u".into())));
        let e = expect_failure(s.on_chunk_sent(r, Ok(ResumeUploadResponse::Incomplete { next_offset: 0 })));
        assert!(matches!(e, UploadFailure::Protocol(_)));
    }

    #[test]
    fn offset_beyond_sent_range_is_rejected() {
        let mut s = session_for(25);
        let r = expect_resume(s.on_initiated(Ok("u".into())));
        let e = expect_failure(s.on_chunk_sent(r, Ok(ResumeUploadResponse::Incomplete { next_offset: 15 })));
        assert!(matches!(e, UploadFailure::Protocol(_)));
    }

    #[test]
    fn incomplete_at_full_length_is_rejected() {
        let mut s = session_for(10);
        let r = expect_resume(s.on_initiated(Ok("u".into())));
        let e = expect_failure(s.on_chunk_sent(r, Ok(ResumeUploadResponse::Incomplete { next_offset: 10 })));
        assert!(matches!(e, UploadFailure::Protocol(_)));
    }

    #[test]
    fn chunk_response_before_initiate_is_rejected() {
        let mut s = session_for(10);
        let e = expect_failure(s.on_chunk_sent(
            ByteRange::new(0, 10).unwrap(),
            Ok(ResumeUploadResponse::Complete(doc())),
        ));
        assert!(matches!(e, UploadFailure::Protocol(_)));
    }

    #[test]
    fn read_failure_ends_session() {
        let mut s = session_for(10);
        let _ = expect_resume(s.on_initiated(Ok("u".into())));
        let e = expect_failure(s.on_read_failed(TransferError::SourceNotFound("/tmp/dummy.txt".into())));
        assert_eq!(e.kind(), crate::UploadErrorKind::SourceNotFound);
        assert_eq!(s.state(), SessionState::Failed);
    }

    #[test]
    fn cancel_is_terminal() {
        let mut s = session_for(10);
        let e = expect_failure(s.on_cancelled());
        assert!(matches!(e, UploadFailure::Cancelled));
        assert_eq!(s.state(), SessionState::Cancelled);
    }

    #[test]
    fn resume_params_use_session_location() {
        let mut s = session_for(25);
        let r = expect_resume(s.on_initiated(Ok("http://test/upload_location".into())));
        let p = s.resume_params(r, vec![0u8; 10]);
        assert_eq!(p.upload_location, "http://test/upload_location");
        assert_eq!(p.range, r);
        assert_eq!(p.content_length, 25);
        assert_eq!(p.content_type, "text/plain");
    }
}
