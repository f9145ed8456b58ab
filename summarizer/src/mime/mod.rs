//! MIME handling: part model, body decoding and body selection.
//!
//! ```text
//! raw RFC 5322 → parse_raw_message() → MessagePart tree → select_body() → HTML
//! ```

pub mod decoder;
pub mod part;
pub mod raw;
pub mod selector;

pub use decoder::{decode_body, decode_part};
pub use part::{ContentType, DecodedText, Disposition, MessagePart};
pub use raw::{parse_raw_message, RawMessage};
pub use selector::select_body;
