//! Line size estimation from a bounded prefix of the object.

use crate::error::{Error, Result};
use crate::lines::lines;
use serde::{Deserialize, Serialize};

/// Output of the estimator, shared by every chunk of one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineEstimate {
    /// Estimated bytes per line, terminator included, biased up by one.
    pub average_line_size: u64,
    /// Bytes per line terminator: 1 for `\n`, 2 for `\r\n`.
    pub terminator_width: u8,
}

/// Detect the line terminator width from the first `\n` in `window`.
///
/// Returns 2 when that `\n` is preceded by `\r`, otherwise 1. A window with
/// no `\n` at all defaults to 1.
pub fn detect_terminator_width(window: &[u8]) -> u8 {
    match window.iter().position(|b| *b == b'\n') {
        Some(pos) if pos > 0 && window[pos - 1] == b'\r' => 2,
        _ => 1,
    }
}

/// Estimate the average line size from up to `sample_lines` lines of `window`.
///
/// The window starts at byte 0, so the header line is one of the sampled
/// lines.
///
/// Each sampled line contributes its content length plus the detected
/// terminator width. The average is `floor((sum + count) / count)`: the extra
/// byte per line over-provisions the look-ahead padding rather than
/// under-provisioning it.
pub fn estimate(window: &[u8], sample_lines: usize) -> Result<LineEstimate> {
    let terminator_width = detect_terminator_width(window);

    let (sum, count) = lines(window)
        .take(sample_lines)
        .fold((0u64, 0u64), |(sum, count), line| {
            (
                sum + line.content.len() as u64 + u64::from(terminator_width),
                count + 1,
            )
        });

    if count == 0 {
        return Err(Error::Estimation(
            "no sample lines available (object is empty or unreadable)".to_string(),
        ));
    }

    let average_line_size = (sum + count) / count;
    tracing::debug!(
        sampled_lines = count,
        average_line_size,
        terminator_width,
        "estimated line size"
    );

    Ok(LineEstimate {
        average_line_size,
        terminator_width,
    })
}
