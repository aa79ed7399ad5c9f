use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use crate::TransferError;
use crate::plan::ByteRange;

/// Reads bounded byte ranges from local files.
///
/// Implementations must be idempotent: reading the same range twice yields
/// the same bytes unless the file was modified externally, which is not
/// detected.
pub trait ChunkSource: Send + Sync {
    /// Returns the current size of `path` in bytes.
    fn file_size(&self, path: &Path) -> Result<u64, TransferError>;

    /// Reads exactly `range.len()` bytes starting at `range.start()`.
    fn read(&self, path: &Path, range: ByteRange) -> Result<Vec<u8>, TransferError>;

    /// Returns `true` if `path` exists and is a regular file.
    fn exists(&self, path: &Path) -> bool {
        self.file_size(path).is_ok()
    }
}

/// [`ChunkSource`] backed by the local filesystem.
///
/// Each read opens the file afresh so no handle outlives a chunk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileChunkSource;

impl FileChunkSource {
    pub fn new() -> Self {
        Self
    }
}

fn open(path: &Path) -> Result<std::fs::File, TransferError> {
    std::fs::File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => TransferError::SourceNotFound(path.to_path_buf()),
        _ => TransferError::Io(e),
    })
}

impl ChunkSource for FileChunkSource {
    fn file_size(&self, path: &Path) -> Result<u64, TransferError> {
        let meta = std::fs::metadata(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => TransferError::SourceNotFound(path.to_path_buf()),
            _ => TransferError::Io(e),
        })?;
        if !meta.is_file() {
            return Err(TransferError::SourceNotFound(path.to_path_buf()));
        }
        Ok(meta.len())
    }

    fn read(&self, path: &Path, range: ByteRange) -> Result<Vec<u8>, TransferError> {
        let mut file = open(path)?;
        if range.is_empty() {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(range.start()))?;

        let expected = range.len();
        let mut buf = Vec::with_capacity(expected as usize);
        let n = file.take(expected).read_to_end(&mut buf)? as u64;
        if n != expected {
            return Err(TransferError::ShortRead {
                expected,
                actual: n,
            });
        }
        Ok(buf)
    }
}
