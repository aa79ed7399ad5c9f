//! Resumable chunked upload engine.
//!
//! Transfers local files to a remote document service that speaks a
//! session-based resumable protocol. The crate has no transport of its own:
//! the host provides a [`RemoteUploadService`] implementation and the engine
//! drives it.
//!
//! # Flow
//!
//! 1. **Pre-flight**: the engine checks the local file exists
//! 2. **Initiate**: the service hands back a session upload URL
//! 3. **Transfer**: 512 KiB chunks are pushed one at a time, each starting at
//!    the offset the service last acknowledged
//! 4. **Complete**: the final chunk returns the document metadata and the
//!    caller's completion callback fires exactly once

pub mod config;
pub mod engine;
pub mod error;
pub mod service;
pub mod session;
pub mod status;
pub mod types;

// Re-export primary types for convenience.
pub use config::EngineConfig;
pub use engine::UploadEngine;
pub use error::{ConfigError, ServiceError, UploadErrorKind, UploadFailure};
pub use service::{
    InitiateUploadParams, RemoteUploadService, ResumeUploadParams, ResumeUploadResponse,
    ServiceFuture,
};
pub use session::UploadSession;
pub use status::SessionStatus;
pub use types::{
    CompletionCallback, DocumentEntry, ReadyCallback, SessionId, SessionState, UploadEvent,
    UploadMode, UploadOutcome, UploadProgress, UploadRequest,
};

pub use docupload_transfer::{ByteRange, ChunkSource, FileChunkSource, UPLOAD_CHUNK_SIZE};
