//! Chunk planning.
//!
//! The planner partitions `[terminator_width, total_file_size]` into ordered
//! chunk specifications. Consecutive chunks leave exactly one byte of gap
//! between them; the executor's look-back padding reclaims it.

use crate::MAX_PARTS;
use crate::error::{Error, Result};
use crate::estimate::LineEstimate;
use serde::{Deserialize, Serialize};

/// One planned unit of work. Immutable once produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSpec {
    /// 1-based sequential id; doubles as the multipart part number.
    pub id: u32,
    /// First planned byte of the chunk.
    pub start_position: u64,
    /// Planned end of the chunk; the last chunk ends at `total_file_size`.
    pub end_position: u64,
    /// Line terminator width for the whole run.
    pub terminator_width: u8,
    /// Estimated average line size for the whole run.
    pub average_line_size: u64,
    /// Size of the source object.
    pub total_file_size: u64,
}

/// Target bytes per chunk: `max(average_line_size * min_lines, min_chunk_size)`.
pub fn target_chunk_bytes(
    average_line_size: u64,
    min_lines_per_chunk: u64,
    min_chunk_size_bytes: u64,
) -> Result<u64> {
    let by_lines = average_line_size
        .checked_mul(min_lines_per_chunk)
        .ok_or_else(|| {
            Error::Planning(format!(
                "chunk size overflows: {average_line_size} bytes x {min_lines_per_chunk} lines"
            ))
        })?;
    let target = by_lines.max(min_chunk_size_bytes);
    if target == 0 {
        return Err(Error::Planning(
            "derived chunk size is zero; raise min_lines_per_chunk or min_chunk_size_bytes"
                .to_string(),
        ));
    }
    Ok(target)
}

/// Plan the chunks covering an object of `total_file_size` bytes.
///
/// Returns an empty plan when the object holds nothing beyond a single
/// terminator. The result depends only on the arguments.
pub fn plan_chunks(
    estimate: LineEstimate,
    total_file_size: u64,
    min_lines_per_chunk: u64,
    min_chunk_size_bytes: u64,
) -> Result<Vec<ChunkSpec>> {
    let target = target_chunk_bytes(
        estimate.average_line_size,
        min_lines_per_chunk,
        min_chunk_size_bytes,
    )?;

    let mut cursor = u64::from(estimate.terminator_width);
    if total_file_size <= cursor {
        return Ok(Vec::new());
    }

    let mut chunks = Vec::new();
    let mut id: u32 = 1;
    while cursor < total_file_size {
        if id as usize > MAX_PARTS {
            return Err(Error::Planning(format!(
                "object of {total_file_size} bytes needs more than {MAX_PARTS} chunks of \
                 {target} bytes"
            )));
        }

        let mut end_position = cursor.saturating_add(target).min(total_file_size);
        // No chunk can start on the final byte, so the chunk before it owns it.
        if end_position + 1 == total_file_size {
            end_position = total_file_size;
        }
        chunks.push(ChunkSpec {
            id,
            start_position: cursor,
            end_position,
            terminator_width: estimate.terminator_width,
            average_line_size: estimate.average_line_size,
            total_file_size,
        });

        id += 1;
        cursor = end_position + 1;
    }

    tracing::debug!(
        chunks = chunks.len(),
        target_chunk_bytes = target,
        total_file_size,
        "planned chunks"
    );

    Ok(chunks)
}
