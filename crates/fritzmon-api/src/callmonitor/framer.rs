// ── Newline framing for the call-monitor byte stream ──
//
// The router writes one event per `\n`-terminated line, but TCP reads
// split and merge those lines arbitrarily. `LineFramer` buffers the
// partial tail between reads and hands out complete lines lazily.

use bytes::{Buf, BytesMut};
use thiserror::Error;

/// Default cap on buffered, still-unterminated data.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4096;

/// Malformed call-monitor stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// More than `limit` bytes arrived without a line terminator.
    /// The buffered data was dropped; framing resumes after the next `\n`.
    #[error("call monitor line exceeds {limit} bytes without a terminator")]
    LineTooLong { limit: usize },
}

/// Incremental line splitter with a bounded buffer.
///
/// Restartable per connection: call [`reset`](Self::reset) on reconnect.
#[derive(Debug)]
pub struct LineFramer {
    buf: BytesMut,
    max_line_length: usize,
    /// Set after an overflow: bytes are dropped until the next `\n`.
    discarding: bool,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LENGTH)
    }
}

impl LineFramer {
    pub fn new(max_line_length: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(max_line_length.min(DEFAULT_MAX_LINE_LENGTH)),
            max_line_length,
            discarding: false,
        }
    }

    /// Append `data` and return an iterator over the lines it completes.
    ///
    /// Lines are yielded without their `\n` (and without a trailing `\r`).
    /// Anything after the last terminator stays buffered for the next call.
    pub fn feed(&mut self, data: &[u8]) -> Lines<'_> {
        self.buf.extend_from_slice(data);
        Lines { framer: self }
    }

    /// Drop all buffered state (used when the connection is re-established).
    pub fn reset(&mut self) {
        self.buf.clear();
        self.discarding = false;
    }

    /// Number of buffered bytes still waiting for a terminator.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    fn next_line(&mut self) -> Option<Result<String, ProtocolError>> {
        loop {
            match self.buf.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    let raw = self.buf.split_to(pos + 1);
                    if self.discarding {
                        // Tail of an oversized line: resync here.
                        self.discarding = false;
                        continue;
                    }
                    let line = &raw[..pos];
                    let line = line.strip_suffix(b"\r").unwrap_or(line);
                    if line.len() > self.max_line_length {
                        return Some(Err(ProtocolError::LineTooLong {
                            limit: self.max_line_length,
                        }));
                    }
                    return Some(Ok(String::from_utf8_lossy(line).into_owned()));
                }
                None => {
                    if self.buf.len() > self.max_line_length {
                        let was_discarding = self.discarding;
                        self.buf.advance(self.buf.len());
                        self.discarding = true;
                        if !was_discarding {
                            return Some(Err(ProtocolError::LineTooLong {
                                limit: self.max_line_length,
                            }));
                        }
                    }
                    return None;
                }
            }
        }
    }
}

/// Lazy iterator over the complete lines produced by one [`LineFramer::feed`].
pub struct Lines<'a> {
    framer: &'a mut LineFramer,
}

impl Iterator for Lines<'_> {
    type Item = Result<String, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.framer.next_line()
    }
}
