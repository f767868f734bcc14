//! Server-sent events decoding for the MCP SSE transport.

use std::collections::VecDeque;

use futures_util::{Stream, StreamExt};
use tracing::warn;

use crate::error::{Error, Result};

/// Maximum size of a single buffered event (4MB).
/// Sized for large tool outputs (full coin lists, market pages).
pub const MAX_EVENT_SIZE: usize = 4 * 1024 * 1024;

/// Event name used when the server omits the `event:` field.
const DEFAULT_EVENT: &str = "message";

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental `text/event-stream` parser.
///
/// Bytes may arrive split at arbitrary points; complete lines are consumed
/// and an event is emitted on each blank line.
#[derive(Debug, Default)]
pub struct EventParser {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    data_len: usize,
}

impl EventParser {
    /// Feed a chunk and return every event it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut search_index = 0;

        while let Some(relative_pos) = self.buffer[search_index..].iter().position(|b| *b == b'\n')
        {
            let newline_index = search_index + relative_pos;
            let mut line_end = newline_index;
            if line_end > search_index && self.buffer[line_end - 1] == b'\r' {
                line_end -= 1;
            }

            let line = String::from_utf8_lossy(&self.buffer[search_index..line_end]).into_owned();
            if let Some(event) = self.feed_line(&line) {
                events.push(event);
            }

            search_index = newline_index + 1;
        }

        if search_index > 0 {
            self.buffer.drain(..search_index);
        }

        let size = self.buffer.len() + self.data_len;
        if size > MAX_EVENT_SIZE {
            let event = self.event.as_deref().unwrap_or(DEFAULT_EVENT).to_string();
            warn!(event = %event, size, max = MAX_EVENT_SIZE, "server event exceeds size limit");
            return Err(Error::EventTooLarge {
                event,
                size,
                max: MAX_EVENT_SIZE,
            });
        }

        Ok(events)
    }

    /// Flush a trailing unterminated line and any pending event.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            let line = String::from_utf8_lossy(&self.buffer).into_owned();
            self.buffer.clear();
            if let Some(event) = self.feed_line(&line) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn feed_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                self.data_len += value.len();
                self.data.push(value.to_string());
            }
            // id and retry are irrelevant here: there is no reconnect
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        self.data_len = 0;
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: event
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data,
        })
    }
}

/// Pull-based event reader over an HTTP body stream.
pub struct EventStream<S> {
    inner: S,
    parser: EventParser,
    queued: VecDeque<SseEvent>,
    done: bool,
}

impl<S, B, E> EventStream<S>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            parser: EventParser::default(),
            queued: VecDeque::new(),
            done: false,
        }
    }

    /// Next event, or `None` once the stream has ended.
    pub async fn next_event(&mut self) -> Result<Option<SseEvent>> {
        loop {
            if let Some(event) = self.queued.pop_front() {
                return Ok(Some(event));
            }
            if self.done {
                return Ok(None);
            }

            match self.inner.next().await {
                Some(Ok(chunk)) => {
                    self.queued.extend(self.parser.push(chunk.as_ref())?);
                }
                Some(Err(e)) => return Err(Error::Transport(e.to_string())),
                None => {
                    self.done = true;
                    self.queued.extend(self.parser.finish());
                }
            }
        }
    }
}
