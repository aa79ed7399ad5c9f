use std::fmt;

use serde::Serialize;

use crate::TransferError;

/// A half-open byte range `[start, end)` within a file.
///
/// Empty ranges are legal: a zero-length file is uploaded as a single empty
/// chunk that tells the service the content is complete. `start <= end`
/// always holds; [`ByteRange::new`] is the only constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ByteRange {
    start: u64,
    end: u64,
}

impl ByteRange {
    /// Creates a range, rejecting `end < start`.
    pub fn new(start: u64, end: u64) -> Result<Self, TransferError> {
        if end < start {
            return Err(TransferError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// First byte of the range.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// One past the last byte of the range.
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of bytes covered.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Inclusive index of the last byte, `None` for an empty range.
    pub fn last(&self) -> Option<u64> {
        if self.is_empty() {
            None
        } else {
            Some(self.end - 1)
        }
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.last() {
            Some(last) => write!(f, "{}-{}", self.start, last),
            None => write!(f, "{}-(empty)", self.start),
        }
    }
}

/// Splits a fixed content length into upload chunks.
///
/// Ranges are `[0, C)`, `[C, 2C)`, ..., `[kC, len)`. A length that is an
/// exact multiple of `C` produces no trailing empty chunk; a zero length
/// produces exactly one empty chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    content_length: u64,
    chunk_size: u64,
}

impl ChunkPlan {
    /// Creates a plan. If `chunk_size` is 0, [`UPLOAD_CHUNK_SIZE`](crate::UPLOAD_CHUNK_SIZE) is used.
    pub fn new(content_length: u64, chunk_size: usize) -> Self {
        let chunk_size = if chunk_size == 0 {
            crate::UPLOAD_CHUNK_SIZE
        } else {
            chunk_size
        };
        Self {
            content_length,
            chunk_size: chunk_size as u64,
        }
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Total number of resume calls a clean upload needs.
    pub fn chunk_count(&self) -> u64 {
        if self.content_length == 0 {
            1
        } else {
            self.content_length.div_ceil(self.chunk_size)
        }
    }

    /// The chunk that starts at `offset`: `[offset, min(offset + C, len))`.
    ///
    /// `offset` comes from the service's acknowledgement, so it need not be
    /// aligned to a chunk boundary.
    pub fn range_at(&self, offset: u64) -> Result<ByteRange, TransferError> {
        if offset > self.content_length {
            return Err(TransferError::InvalidRange {
                start: offset,
                end: self.content_length,
            });
        }
        let end = offset.saturating_add(self.chunk_size).min(self.content_length);
        ByteRange::new(offset, end)
    }

    /// Iterates over every chunk of a clean, fully acknowledged upload.
    pub fn ranges(&self) -> impl Iterator<Item = ByteRange> + '_ {
        let count = self.chunk_count();
        (0..count).map(move |i| {
            let start = i * self.chunk_size;
            ByteRange {
                start,
                end: (start + self.chunk_size).min(self.content_length),
            }
        })
    }
}
