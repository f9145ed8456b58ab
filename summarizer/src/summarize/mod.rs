//! Summary generation against a local inference server.
//!
//! ```text
//! text + subject → prompt → POST /api/generate (stream) → StreamParser → summary
//! ```

pub mod client;
pub mod prompt;
pub mod recover;
pub mod stream;

pub use client::{ClientOptions, OllamaClient};
pub use prompt::{build_system_prompt, build_user_prompt, DEFAULT_SYSTEM_PROMPT};
pub use stream::{StreamParser, StreamState};

/// Receives partial summaries while one is being generated.
///
/// `done` is true exactly once per computation, on the last call.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, key: &str, partial: &str, done: bool);
}

impl<F> ProgressSink for F
where
    F: Fn(&str, &str, bool) + Send + Sync,
{
    fn on_progress(&self, key: &str, partial: &str, done: bool) {
        self(key, partial, done)
    }
}

/// Sink that drops every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn on_progress(&self, _key: &str, _partial: &str, _done: bool) {}
}
