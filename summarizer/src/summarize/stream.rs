//! Incremental parser for the model server's NDJSON response stream.
//!
//! ```text
//! Connecting → Streaming → Draining → (Recovering) → Completed
//! ```
//!
//! The parser owns no I/O: the client feeds it body chunks, so the whole
//! machine can be driven with synthetic input.

use std::time::{Duration, Instant};

use encoding_rs::{Decoder, UTF_8};
use serde_json::Value;
use tracing::{debug, info};

use super::recover::recover_response;

/// One object of the `/api/generate` stream.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GenerateChunk {
    pub response: Option<String>,
    pub done: Option<bool>,
}

impl GenerateChunk {
    /// Parse one line; anything that is not a JSON object yields `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(line).ok()?;
        let object = value.as_object()?;
        Some(Self {
            response: object
                .get("response")
                .and_then(Value::as_str)
                .map(str::to_string),
            done: object.get("done").and_then(Value::as_bool),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Connecting,
    Streaming,
    Draining,
    Recovering,
    Completed,
}

pub struct StreamParser {
    state: StreamState,
    decoder: Decoder,
    /// Everything received, for the recovery strategies
    raw: String,
    /// Incomplete trailing line
    line_buffer: String,
    summary: String,
    throttle: Duration,
    last_emit: Option<Instant>,
    frames: usize,
    skipped: usize,
}

impl StreamParser {
    pub fn new(throttle: Duration) -> Self {
        Self {
            state: StreamState::Connecting,
            decoder: UTF_8.new_decoder(),
            raw: String::new(),
            line_buffer: String::new(),
            summary: String::new(),
            throttle,
            last_emit: None,
            frames: 0,
            skipped: 0,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Accumulated summary so far.
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// The response body is open and readable.
    pub fn open(&mut self) {
        if self.state == StreamState::Connecting {
            self.state = StreamState::Streaming;
        }
    }

    /// Consume one body chunk, reporting progress for every complete line.
    /// Once a line carries `done: true` the rest of the body is ignored.
    pub fn feed<F>(&mut self, chunk: &[u8], on_progress: &mut F)
    where
        F: FnMut(&str, bool),
    {
        self.open();
        if self.state != StreamState::Streaming {
            debug!(state = ?self.state, "ndjson_chunk_ignored");
            return;
        }

        let text = self.decode(chunk, false);
        self.raw.push_str(&text);
        self.line_buffer.push_str(&text);

        while self.state == StreamState::Streaming {
            let Some(pos) = self.line_buffer.find('\n') else {
                break;
            };
            let line: String = self.line_buffer.drain(..=pos).collect();
            self.handle_line(line.trim(), on_progress);
        }
    }

    /// End of stream: drain the partial line, recover if nothing was parsed,
    /// send the only terminal callback and return the trimmed summary.
    pub fn finish<F>(&mut self, on_progress: &mut F) -> String
    where
        F: FnMut(&str, bool),
    {
        if self.state == StreamState::Completed {
            return self.summary.clone();
        }

        if self.state != StreamState::Draining {
            let tail = self.decode(&[], true);
            self.raw.push_str(&tail);
            self.line_buffer.push_str(&tail);

            self.state = StreamState::Draining;
            let rest = std::mem::take(&mut self.line_buffer);
            if let Some(chunk) = GenerateChunk::parse(rest.trim()) {
                self.frames += 1;
                if let Some(response) = chunk.response {
                    self.summary.push_str(&response);
                }
            }
        }

        if self.summary.trim().is_empty() && !self.raw.trim().is_empty() {
            self.state = StreamState::Recovering;
            if let Some(recovered) = recover_response(&self.raw) {
                info!(
                    raw_length = self.raw.len(),
                    recovered_length = recovered.len(),
                    "ndjson_recovered"
                );
                self.summary = recovered;
            }
        }

        self.summary = self.summary.trim().to_string();
        self.state = StreamState::Completed;
        self.last_emit = Some(Instant::now());
        on_progress(&self.summary, true);

        info!(
            frames = self.frames,
            skipped_lines = self.skipped,
            raw_length = self.raw.len(),
            summary_length = self.summary.len(),
            "ndjson_stream_complete"
        );

        self.summary.clone()
    }

    fn decode(&mut self, chunk: &[u8], last: bool) -> String {
        let capacity = self
            .decoder
            .max_utf8_buffer_length(chunk.len())
            .unwrap_or(chunk.len() * 3 + 4);
        let mut text = String::with_capacity(capacity);
        let _ = self.decoder.decode_to_string(chunk, &mut text, last);
        text
    }

    fn handle_line<F>(&mut self, line: &str, on_progress: &mut F)
    where
        F: FnMut(&str, bool),
    {
        if line.is_empty() {
            return;
        }

        let Some(chunk) = GenerateChunk::parse(line) else {
            self.skipped += 1;
            debug!(line_length = line.len(), "ndjson_line_skipped");
            return;
        };

        self.frames += 1;
        if let Some(response) = chunk.response {
            self.summary.push_str(&response);
        }
        if chunk.done == Some(true) {
            debug!(frames = self.frames, "ndjson_done_received");
            self.state = StreamState::Draining;
            self.line_buffer.clear();
            return;
        }
        self.emit_partial(on_progress);
    }

    /// Non-terminal updates, at most one per throttle window.
    fn emit_partial<F>(&mut self, on_progress: &mut F)
    where
        F: FnMut(&str, bool),
    {
        let now = Instant::now();
        if let Some(last) = self.last_emit {
            if now.duration_since(last) < self.throttle {
                return;
            }
        }

        self.last_emit = Some(now);
        on_progress(&self.summary, false);
    }
}
