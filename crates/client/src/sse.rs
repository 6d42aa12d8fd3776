//! Incremental Server-Sent Events framing.

const DEFAULT_EVENT: &str = "message";

/// Longest line held while waiting for its terminator.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// One complete event: a name and its (non-empty) data payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Line-oriented SSE state machine.
///
/// Each `data:` line replaces the buffered payload, so only single-line
/// payloads survive intact. Servers in this system emit one JSON document
/// per event, which fits that model.
#[derive(Debug)]
pub struct SseParser {
    event: String,
    data: String,
    partial: Vec<u8>,
    after_cr: bool,
    overflowed: bool,
}

impl Default for SseParser {
    fn default() -> Self {
        Self {
            event: DEFAULT_EVENT.to_owned(),
            data: String::new(),
            partial: Vec::new(),
            after_cr: false,
            overflowed: false,
        }
    }
}

impl SseParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one line without its terminator. Returns an event when the line
    /// is blank and data has been buffered.
    pub fn feed_line(&mut self, line: &str) -> Option<SseEvent> {
        let line = line.trim();
        if line.is_empty() {
            let data = std::mem::take(&mut self.data);
            let event = std::mem::replace(&mut self.event, DEFAULT_EVENT.to_owned());
            return (!data.is_empty()).then_some(SseEvent { event, data });
        }

        if let Some(rest) = line.strip_prefix("data:") {
            let rest = rest.trim_start();
            if !rest.is_empty() {
                rest.clone_into(&mut self.data);
            }
        } else if let Some(rest) = line.strip_prefix("event:") {
            rest.trim().clone_into(&mut self.event);
        } else if line.starts_with("id:") || line.starts_with("retry:") || line.starts_with(':') {
            // ignored
        } else {
            tracing::debug!(line, "Unrecognized SSE line");
        }
        None
    }

    /// Feeds a raw chunk of the stream. Lines split across chunks are held
    /// until their terminator arrives. `\n`, `\r\n` and a bare `\r` all end a
    /// line, including a `\r\n` pair split between two chunks. A line longer
    /// than [`MAX_LINE_BYTES`] is dropped.
    pub fn feed_bytes(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();
        for &byte in chunk {
            let after_cr = std::mem::take(&mut self.after_cr);
            match byte {
                b'\n' if after_cr => {},
                b'\n' | b'\r' => {
                    self.after_cr = byte == b'\r';
                    if let Some(event) = self.end_line() {
                        events.push(event);
                    }
                },
                _ if self.overflowed => {},
                _ => {
                    self.partial.push(byte);
                    if self.partial.len() > MAX_LINE_BYTES {
                        tracing::warn!(limit = MAX_LINE_BYTES, "SSE line too long, discarding");
                        self.partial = Vec::new();
                        self.overflowed = true;
                    }
                },
            }
        }
        events
    }

    fn end_line(&mut self) -> Option<SseEvent> {
        let line = std::mem::take(&mut self.partial);
        if std::mem::take(&mut self.overflowed) {
            return None;
        }
        self.feed_line(&String::from_utf8_lossy(&line))
    }
}
