//! Line-boundary reconstruction for a single chunk.
//!
//! A chunk is read with padding on both sides: `terminator_width` bytes of
//! look-back and `2 * average_line_size` bytes of look-ahead. The first line
//! in the padded buffer always belongs to the previous chunk (or is the
//! header) and is dropped. After that, every line that starts at or before
//! the byte where the next chunk's look-back begins is kept, so the line
//! straddling `end_position` stays with this chunk and the next chunk drops
//! it as its own first line.

use crate::error::{Error, Result};
use crate::header::Header;
use crate::lines::lines;
use crate::plan::ChunkSpec;
use bytes::Bytes;

/// Half-open byte range `[start, end)` of the source object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadRange {
    pub start: u64,
    pub end: u64,
}

impl ReadRange {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

impl ChunkSpec {
    /// The padded range this chunk must read.
    pub fn read_range(&self) -> ReadRange {
        let start = self
            .start_position
            .saturating_sub(u64::from(self.terminator_width));
        let look_ahead = self.average_line_size.saturating_mul(2);
        let end = self
            .end_position
            .saturating_add(look_ahead)
            .min(self.total_file_size);
        ReadRange { start, end }
    }

    /// Last byte offset at which a line may start and still belong to this
    /// chunk. Equal to the next chunk's look-back start.
    pub fn handoff_position(&self) -> u64 {
        self.end_position + 1 - u64::from(self.terminator_width)
    }

    pub fn is_first(&self) -> bool {
        self.id == 1
    }
}

/// The serialized output of one chunk, ready to upload as a part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutedPart {
    /// Multipart part number; equal to the chunk id.
    pub part_number: u32,
    /// Retained lines, each followed by `\n`, with the header first on part 1.
    pub payload: Bytes,
    /// Number of lines retained (the header is not counted).
    pub record_count: u64,
}

/// Rebuild the exact set of lines owned by `chunk` from its padded bytes.
///
/// `bytes` must be the content of `range` as returned by
/// [`ChunkSpec::read_range`]. Fails with [`Error::LineExceedsPadding`] when a
/// line the chunk depends on is cut off by the end of the buffer before the
/// end of the object, which happens only when a line is longer than the
/// look-ahead padding.
pub fn reconstruct(
    chunk: &ChunkSpec,
    range: ReadRange,
    bytes: &[u8],
    header: &Header,
) -> Result<ExecutedPart> {
    if bytes.len() as u64 != range.len() {
        return Err(Error::ShortRead {
            chunk_id: chunk.id,
            expected: range.len(),
            actual: bytes.len() as u64,
        });
    }

    let reaches_end = range.end >= chunk.total_file_size;
    let handoff = chunk.handoff_position();
    let overflow = || Error::LineExceedsPadding {
        chunk_id: chunk.id,
        read_start: range.start,
        read_end: range.end,
    };

    let mut payload = Vec::with_capacity(bytes.len() + 1);
    if chunk.is_first() {
        payload.extend_from_slice(header.render().as_bytes());
        payload.push(b'\n');
    }

    let mut iter = lines(bytes);
    let mut cursor = range.start;

    match iter.next() {
        Some(first) if first.terminated || reaches_end => cursor += first.consumed as u64,
        _ if reaches_end => {}
        _ => return Err(overflow()),
    }

    let mut record_count = 0u64;
    for line in iter {
        if cursor > handoff {
            break;
        }
        if !line.terminated && !reaches_end {
            return Err(overflow());
        }

        payload.extend_from_slice(line.content);
        payload.push(b'\n');
        record_count += 1;
        cursor += line.consumed as u64;
    }

    if cursor <= handoff && !reaches_end {
        return Err(overflow());
    }

    tracing::trace!(
        chunk_id = chunk.id,
        read_start = range.start,
        read_end = range.end,
        record_count,
        "reconstructed chunk"
    );

    Ok(ExecutedPart {
        part_number: chunk.id,
        payload: Bytes::from(payload),
        record_count,
    })
}
