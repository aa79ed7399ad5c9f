//! Upload error types.

use serde::{Deserialize, Serialize};

use docupload_transfer::TransferError;

/// Terminal error kind reported through the completion callback.
///
/// Hosts only ever see one of these; the detailed cause stays in the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum UploadErrorKind {
    /// The local file was missing. No network call was made.
    #[error("source file not found")]
    SourceNotFound,

    #[error("upload session initiation failed")]
    SessionInitiationFailed,

    /// A chunk transfer failed. Bytes already acknowledged are not rolled back.
    #[error("chunk transfer failed")]
    TransferFailed,

    #[error("cancelled")]
    Cancelled,
}

/// Errors returned by a [`RemoteUploadService`](crate::RemoteUploadService).
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("no connection: {0}")]
    NoConnection(String),

    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Why a session ended without a document.
#[derive(Debug, thiserror::Error)]
pub enum UploadFailure {
    #[error("source file not found: {}", .0.display())]
    SourceNotFound(std::path::PathBuf),

    #[error("initiate upload failed: {0}")]
    Initiate(#[source] ServiceError),

    #[error("resume upload failed: {0}")]
    Resume(#[source] ServiceError),

    #[error("chunk read failed: {0}")]
    Read(#[from] TransferError),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("task join error: {0}")]
    Join(String),

    #[error("cancelled")]
    Cancelled,
}

impl UploadFailure {
    /// Collapses the failure into the kind reported to the host.
    pub fn kind(&self) -> UploadErrorKind {
        match self {
            Self::SourceNotFound(_) | Self::Read(TransferError::SourceNotFound(_)) => {
                UploadErrorKind::SourceNotFound
            }
            Self::Initiate(_) => UploadErrorKind::SessionInitiationFailed,
            Self::Resume(_) | Self::Read(_) | Self::Protocol(_) | Self::Join(_) => {
                UploadErrorKind::TransferFailed
            }
            Self::Cancelled => UploadErrorKind::Cancelled,
        }
    }
}

/// Invalid engine configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,

    #[error("event buffer must be greater than zero")]
    ZeroEventBuffer,
}
