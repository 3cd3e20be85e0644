//! Newline-delimited frame decoding for the filtered stream.
//!
//! Chunks arrive with arbitrary boundaries; the decoder buffers them and
//! yields one frame per complete `\n`-terminated line. A blank line (the
//! endpoint sends `\r\n`) is a keep-alive.

use crate::error::FrameError;
use crate::models::{RawStreamEvent, StreamProblem};
use bytes::{Buf, BytesMut};

/// Upper bound on a single undelimited frame
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

const SNIPPET_LEN: usize = 120;

#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    Data(Box<RawStreamEvent>),
    KeepAlive,
    ErrorSignal(StreamProblem),
}

#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    max_frame: usize,
    /// Prefix of `buffer` already searched for a delimiter
    scanned: usize,
    /// Dropping the tail of an oversized line
    discarding: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl FrameDecoder {
    pub fn new(max_frame: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            max_frame,
            scanned: 0,
            discarding: false,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Bytes held back waiting for a delimiter
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Next complete frame, or `None` until more bytes arrive.
    ///
    /// An oversized partial frame is discarded and reported once; decoding
    /// resumes after the next delimiter.
    pub fn next_frame(&mut self) -> Option<Result<StreamFrame, FrameError>> {
        loop {
            let found = self.buffer[self.scanned..].iter().position(|&b| b == b'\n');
            let Some(offset) = found else {
                self.scanned = self.buffer.len();
                if self.discarding {
                    self.buffer.clear();
                    self.scanned = 0;
                } else if self.buffer.len() > self.max_frame {
                    self.buffer.clear();
                    self.scanned = 0;
                    self.discarding = true;
                    return Some(Err(FrameError::Oversized {
                        limit: self.max_frame,
                    }));
                }
                return None;
            };

            let line = self.buffer.split_to(self.scanned + offset);
            self.buffer.advance(1);
            self.scanned = 0;

            if self.discarding {
                self.discarding = false;
                continue;
            }

            return Some(decode_line(&line));
        }
    }
}

fn decode_line(line: &[u8]) -> Result<StreamFrame, FrameError> {
    let text = std::str::from_utf8(line)?.trim();
    if text.is_empty() {
        return Ok(StreamFrame::KeepAlive);
    }

    let value: serde_json::Value = serde_json::from_str(text)?;

    // Data frames may carry partial `errors` for expansions; data wins.
    if value.get("data").is_some() || value.get("includes").is_some() {
        let event: RawStreamEvent = serde_json::from_value(value)?;
        return Ok(StreamFrame::Data(Box::new(event)));
    }

    if let Some(problem) = StreamProblem::from_value(&value) {
        return Ok(StreamFrame::ErrorSignal(problem));
    }

    Err(FrameError::UnknownShape(text.chars().take(SNIPPET_LEN).collect()))
}
