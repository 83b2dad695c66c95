//! Reassembles raw byte chunks into complete lines.

use super::error::WatcherError;

/// Default upper bound for a single line, `\n` or `\r\n` excluded.
pub const DEFAULT_MAX_LINE: usize = 1024 * 1024;

/// Splits a byte stream into `\n`-terminated lines across chunk boundaries.
///
/// An unterminated tail is carried over to the next [`feed`](Self::feed).
/// A line longer than the limit is reported once as
/// [`WatcherError::LineTooLong`] and dropped up to its terminator; the lines
/// around it are unaffected.
#[derive(Debug)]
pub struct LineAssembler {
    pending: Vec<u8>,
    max_line: usize,
    /// Inside an over-length line, dropping bytes until the next `\n`.
    discarding: bool,
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE)
    }
}

impl LineAssembler {
    #[must_use]
    pub fn new(max_line: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_line,
            discarding: false,
        }
    }

    /// Append `chunk` and return every line it completes, in order.
    ///
    /// Trailing `\r` is stripped and invalid UTF-8 is replaced lossily.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<String, WatcherError>> {
        let mut out = Vec::new();
        let mut rest = chunk;

        while !rest.is_empty() {
            let (segment, terminated) = match rest.iter().position(|&b| b == b'\n') {
                Some(i) => {
                    let segment = &rest[..i];
                    rest = &rest[i + 1..];
                    (segment, true)
                }
                None => (std::mem::take(&mut rest), false),
            };

            if self.discarding {
                self.discarding = !terminated;
                continue;
            }

            if self.line_len_with(segment) > self.max_line {
                self.pending.clear();
                self.discarding = !terminated;
                out.push(Err(WatcherError::LineTooLong {
                    limit: self.max_line,
                }));
                continue;
            }

            self.pending.extend_from_slice(segment);
            if terminated {
                out.push(Ok(self.take_line()));
            }
        }

        out
    }

    /// Bytes held for an incomplete line.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drop any carried-over partial line.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.discarding = false;
    }

    /// Length of the carried line extended by `segment`, not counting a
    /// trailing `\r` that may belong to a CRLF terminator.
    fn line_len_with(&self, segment: &[u8]) -> usize {
        let len = self.pending.len() + segment.len();
        match segment.last().or(self.pending.last()) {
            Some(b'\r') => len - 1,
            _ => len,
        }
    }

    fn take_line(&mut self) -> String {
        let mut raw = std::mem::take(&mut self.pending);
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }
        match String::from_utf8(raw) {
            Ok(line) => line,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    }
}
