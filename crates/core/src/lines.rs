//! Terminator-aware iteration over raw line bytes.
//!
//! Lines are split on `\n`. A `\r` immediately before the `\n` is treated as
//! part of the terminator and stripped from the content, but still counted
//! in [`Line::consumed`], so byte accounting stays exact for both LF and
//! CRLF input. Content is never decoded, so invalid UTF-8 passes through
//! untouched.

/// A single line produced by [`Lines`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Line<'a> {
    /// Line content without its terminator.
    pub content: &'a [u8],
    /// Bytes consumed from the buffer, terminator included.
    pub consumed: usize,
    /// Whether the line ended with `\n` inside the buffer.
    pub terminated: bool,
}

/// Iterator over the lines of a byte buffer.
///
/// A trailing empty segment after a final `\n` is not reported, matching
/// `BufRead::lines`.
#[derive(Clone, Debug)]
pub struct Lines<'a> {
    remaining: &'a [u8],
}

impl<'a> Lines<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { remaining: buf }
    }
}

impl<'a> Iterator for Lines<'a> {
    type Item = Line<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.is_empty() {
            return None;
        }

        let line = match self.remaining.iter().position(|b| *b == b'\n') {
            Some(newline) => {
                let raw = &self.remaining[..newline];
                let content = raw.strip_suffix(b"\r").unwrap_or(raw);
                self.remaining = &self.remaining[newline + 1..];
                Line {
                    content,
                    consumed: newline + 1,
                    terminated: true,
                }
            }
            None => {
                let content = self.remaining;
                self.remaining = &[];
                Line {
                    content,
                    consumed: content.len(),
                    terminated: false,
                }
            }
        };

        Some(line)
    }
}

/// Iterate the lines of `buf`.
pub fn lines(buf: &[u8]) -> Lines<'_> {
    Lines::new(buf)
}
