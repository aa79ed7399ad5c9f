//! Byte-range bookkeeping and local chunk reads for resumable uploads.
//!
//! The uploader never streams a file front to back: the remote service tells
//! it which offset to continue from, so every read is an explicit
//! `[start, end)` range computed by a [`ChunkPlan`] and served by a
//! [`ChunkSource`].

mod chunked;
mod plan;

use std::path::PathBuf;

pub use chunked::{ChunkSource, FileChunkSource};
pub use plan::{ByteRange, ChunkPlan};

/// Upload chunk size: 512 KiB.
///
/// Every resume call carries at most this many bytes; only the final chunk
/// of a file may be shorter.
pub const UPLOAD_CHUNK_SIZE: usize = 512 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: u64, actual: u64 },

    #[error("invalid range {start}..{end}")]
    InvalidRange { start: u64, end: u64 },
}
