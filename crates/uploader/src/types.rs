//! Data types for the upload flow.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::UploadErrorKind;

/// Engine-assigned identifier of an upload session.
///
/// Ids are allocated monotonically and never handed out twice by the same
/// engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether the upload creates a new document or overwrites a known one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadMode {
    NewFile,
    ExistingFile,
}

/// Caller-supplied description of one upload. Immutable once a session owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub mode: UploadMode,
    /// Where the session is initiated (a create-session URL or the existing
    /// document's edit URL).
    pub remote_parent_location: String,
    /// Logical path of the file on the remote side.
    pub remote_destination_path: PathBuf,
    pub local_file_path: PathBuf,
    /// Display name of the created document. Always `None` for existing files.
    pub title: Option<String>,
    pub content_type: String,
    /// Total bytes to transfer, fixed for the life of the session.
    pub content_length: u64,
    /// Size of the local file as the caller last observed it.
    pub file_size_hint: Option<u64>,
}

impl UploadRequest {
    /// Request that overwrites the content of an existing remote document.
    pub fn existing_file(
        remote_parent_location: impl Into<String>,
        remote_destination_path: impl Into<PathBuf>,
        local_file_path: impl Into<PathBuf>,
        content_type: impl Into<String>,
        content_length: u64,
    ) -> Self {
        Self {
            mode: UploadMode::ExistingFile,
            remote_parent_location: remote_parent_location.into(),
            remote_destination_path: remote_destination_path.into(),
            local_file_path: local_file_path.into(),
            title: None,
            content_type: content_type.into(),
            content_length,
            file_size_hint: None,
        }
    }

    /// Request that creates a new remote document named `title`.
    pub fn new_file(
        remote_parent_location: impl Into<String>,
        remote_destination_path: impl Into<PathBuf>,
        local_file_path: impl Into<PathBuf>,
        title: impl Into<String>,
        content_type: impl Into<String>,
        content_length: u64,
        file_size_hint: u64,
    ) -> Self {
        Self {
            mode: UploadMode::NewFile,
            remote_parent_location: remote_parent_location.into(),
            remote_destination_path: remote_destination_path.into(),
            local_file_path: local_file_path.into(),
            title: Some(title.into()),
            content_type: content_type.into(),
            content_length,
            file_size_hint: Some(file_size_hint),
        }
    }
}

/// Metadata of the document created or updated by a finished upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEntry {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Payload of the completion callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    /// `None` on success.
    pub error: Option<UploadErrorKind>,
    pub remote_destination_path: PathBuf,
    pub local_file_path: PathBuf,
    /// Present only on success.
    pub document: Option<DocumentEntry>,
}

impl UploadOutcome {
    pub(crate) fn success(request: &UploadRequest, document: DocumentEntry) -> Self {
        Self {
            error: None,
            remote_destination_path: request.remote_destination_path.clone(),
            local_file_path: request.local_file_path.clone(),
            document: Some(document),
        }
    }

    pub(crate) fn failure(request: &UploadRequest, error: UploadErrorKind) -> Self {
        Self {
            error: Some(error),
            remote_destination_path: request.remote_destination_path.clone(),
            local_file_path: request.local_file_path.clone(),
            document: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Lifecycle state of an upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Initiating,
    Transferring,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Point-in-time view of a live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub id: SessionId,
    pub state: SessionState,
    pub bytes_sent: u64,
    pub content_length: u64,
    pub remote_destination_path: PathBuf,
}

/// Event emitted by the engine while sessions progress.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    /// The session URL is known; transfer is about to begin.
    Ready { id: SessionId },
    /// The service acknowledged bytes up to `bytes_sent`.
    Progress {
        id: SessionId,
        bytes_sent: u64,
        content_length: u64,
    },
    Completed { id: SessionId, document_id: String },
    /// `id` is `None` when the request was rejected before a session existed.
    Failed {
        id: Option<SessionId>,
        error: UploadErrorKind,
    },
    Cancelled { id: SessionId },
}

/// Fires exactly once per accepted or rejected request.
pub type CompletionCallback = Box<dyn FnOnce(UploadOutcome) + Send + 'static>;

/// Fires once the session URL is known, before any chunk is sent.
pub type ReadyCallback = Box<dyn FnOnce(SessionId) + Send + 'static>;
