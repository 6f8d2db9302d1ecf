//! Incremental decoding of `data: ` event frames from a chunked response body.

use memchr::memchr;
use tracing::debug;

pub const DATA_PREFIX: &str = "data: ";
pub const DONE_SENTINEL: &str = "data: [DONE]";

/// Turns arbitrarily split byte chunks into complete event payloads.
///
/// Bytes are buffered until a newline arrives, so a UTF-8 sequence split across
/// two reads is decoded only once it is whole. Lines that are blank, lack the
/// `data: ` prefix, or are the `[DONE]` sentinel never reach the caller.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns every payload completed by it, prefix stripped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        if self.done {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(relative_pos) = memchr(b'\n', &self.buffer[start..]) {
            let newline_pos = start + relative_pos;
            if let Some(frame) = self.accept_line(start, newline_pos) {
                frames.push(frame);
            }
            start = newline_pos + 1;
            if self.done {
                self.buffer.clear();
                return frames;
            }
        }
        self.buffer.drain(..start);
        frames
    }

    /// Flushes a trailing line that the stream closed without terminating.
    pub fn finish(&mut self) -> Option<String> {
        if self.done || self.buffer.is_empty() {
            self.buffer.clear();
            return None;
        }
        let end = self.buffer.len();
        let frame = self.accept_line(0, end);
        self.buffer.clear();
        frame
    }

    /// True once the `[DONE]` sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    fn accept_line(&mut self, start: usize, end: usize) -> Option<String> {
        let line = match std::str::from_utf8(&self.buffer[start..end]) {
            Ok(line) => line.trim(),
            Err(err) => {
                debug!(error = %err, "Dropping frame with invalid UTF-8");
                return None;
            }
        };

        if line.is_empty() {
            return None;
        }
        if line == DONE_SENTINEL {
            self.done = true;
            return None;
        }
        line.strip_prefix(DATA_PREFIX).map(str::to_owned)
    }
}
