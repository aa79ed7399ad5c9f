//! Remote upload service contract.
//!
//! `RemoteUploadService` is implemented by the host (or by the
//! `docupload-remote` HTTP adapter) so the session logic stays decoupled
//! from transport and testable with mocks.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use docupload_transfer::ByteRange;

use crate::error::ServiceError;
use crate::types::{DocumentEntry, UploadMode};

/// Boxed future returned by service calls.
pub type ServiceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ServiceError>> + Send + 'a>>;

/// Parameters of the session-initiation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiateUploadParams {
    pub mode: UploadMode,
    /// Only set for [`UploadMode::NewFile`].
    pub title: Option<String>,
    pub content_type: String,
    pub content_length: u64,
    /// Where to initiate the session.
    pub upload_location: String,
    pub remote_destination_path: PathBuf,
}

/// Parameters of one chunk transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeUploadParams {
    pub mode: UploadMode,
    /// Session URL returned by the initiate call.
    pub upload_location: String,
    /// Starts at the service's last acknowledged offset.
    pub range: ByteRange,
    pub content_type: String,
    pub content_length: u64,
    /// Exactly `range.len()` bytes.
    pub data: Vec<u8>,
    pub remote_destination_path: PathBuf,
}

/// Service answer to a chunk transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeUploadResponse {
    /// More bytes are expected; the next chunk starts at `next_offset`.
    Incomplete { next_offset: u64 },
    /// All content received; the document is final.
    Complete(DocumentEntry),
}

/// Remote document service driven by the upload engine.
///
/// Retry and timeout policy, if any, belongs to the implementation. The
/// engine never retries a failed call.
pub trait RemoteUploadService: Send + Sync {
    /// Opens an upload session and returns its session URL.
    fn initiate_upload(&self, params: InitiateUploadParams) -> ServiceFuture<'_, String>;

    /// Pushes one byte range into an open session.
    fn resume_upload(&self, params: ResumeUploadParams)
    -> ServiceFuture<'_, ResumeUploadResponse>;
}
