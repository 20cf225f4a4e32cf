//! Incremental `text/event-stream` decoder.
//!
//! Bytes arrive in arbitrary chunks; complete lines are consumed as they
//! appear and a blank line dispatches the accumulated event.

use bytes::BytesMut;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    Event {
        event: Option<String>,
        id: Option<String>,
        data: String,
    },
    /// A `:`-prefixed line, used by servers as a keep-alive.
    Comment(String),
}

/// Default cap on a single event, in bytes.
pub const DEFAULT_MAX_EVENT_BYTES: usize = 1024 * 1024;

/// The event being assembled outgrew the decoder's limit. The decoder should
/// not be fed again afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("event of at least {pending} bytes exceeds limit of {limit}")]
pub struct EventTooLarge {
    pub limit: usize,
    pub pending: usize,
}

#[derive(Debug)]
pub struct SseDecoder {
    buffer: BytesMut,
    /// Prefix of `buffer` already known to hold no newline.
    scanned: usize,
    event: Option<String>,
    last_id: Option<String>,
    data: Vec<String>,
    data_bytes: usize,
    max_event_bytes: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EVENT_BYTES)
    }
}

impl SseDecoder {
    pub fn new(max_event_bytes: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            scanned: 0,
            event: None,
            last_id: None,
            data: Vec::new(),
            data_bytes: 0,
            max_event_bytes,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseFrame>, EventTooLarge> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(offset) = self.buffer[self.scanned..]
            .iter()
            .position(|byte| *byte == b'\n')
        {
            let newline = self.scanned + offset;
            self.scanned = 0;
            let raw = self.buffer.split_to(newline + 1);
            let mut line: &[u8] = &raw[..newline];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            let text = String::from_utf8_lossy(line);
            self.process_line(&text, &mut frames);
            self.check_size(0)?;
        }
        self.scanned = self.buffer.len();
        self.check_size(self.buffer.len())?;
        Ok(frames)
    }

    fn check_size(&self, partial_line: usize) -> Result<(), EventTooLarge> {
        let pending = self.data_bytes + partial_line;
        if pending > self.max_event_bytes {
            return Err(EventTooLarge {
                limit: self.max_event_bytes,
                pending,
            });
        }
        Ok(())
    }

    fn process_line(&mut self, line: &str, frames: &mut Vec<SseFrame>) {
        if line.is_empty() {
            self.dispatch(frames);
            return;
        }
        if let Some(comment) = line.strip_prefix(':') {
            frames.push(SseFrame::Comment(comment.trim_start().to_string()));
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => {
                self.data_bytes += value.len() + 1;
                self.data.push(value.to_string());
            }
            "event" => self.event = Some(value.to_string()),
            "id" => self.last_id = Some(value.to_string()),
            // Reconnect timing belongs to the client's backoff policy.
            "retry" => {}
            _ => {}
        }
    }

    fn dispatch(&mut self, frames: &mut Vec<SseFrame>) {
        let event = self.event.take();
        if self.data.is_empty() {
            return;
        }
        frames.push(SseFrame::Event {
            event,
            id: self.last_id.clone(),
            data: self.data.join("\n"),
        });
        self.data.clear();
        self.data_bytes = 0;
    }
}
