//! Mailsum - email summaries from a local language model.
//!
//! This library provides shared modules for the two Mailsum binaries:
//! - `mailsum`: Summarize one raw message file from the command line
//! - `mailsum-web`: HTTP front end for raw messages and settings
//!
//! ## Architecture
//!
//! ```text
//! MessagePart tree → select_body → HTML → ExtractorChain → text
//!     → SummaryService (cache / single-flight) → OllamaClient (NDJSON stream) → summary
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod html;
pub mod mime;
pub mod service;
pub mod settings;
pub mod summarize;
pub mod web;

// Re-export commonly used types
pub use cache::{CoalescingCache, SummaryCache};
pub use config::Config;
pub use error::{ClientError, SummaryError};
pub use html::{extract_readable_text, ExtractOptions, ExtractorChain, ReadableTextExtractor};
pub use mime::{parse_raw_message, select_body, MessagePart, RawMessage};
pub use service::{SummaryResult, SummaryService};
pub use settings::{Settings, SettingsSource, SettingsUpdate, SharedSettings};
pub use summarize::{NoopSink, OllamaClient, ProgressSink};
pub use web::AppState;
