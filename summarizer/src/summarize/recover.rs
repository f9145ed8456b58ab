//! Last-resort decoding of a response body that yielded no summary text
//! when read line by line.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::stream::GenerateChunk;
use crate::mime::decoder::decode_base64;

static OBJECT_BOUNDARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\}\s*\{").expect("valid boundary regex"));

static BASE64_PAYLOAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9+/]+=*$").expect("valid base64 regex"));

/// Try each strategy in order; the first non-empty text wins.
pub fn recover_response(raw: &str) -> Option<String> {
    if let Some(text) = from_concatenated_objects(raw) {
        debug!(strategy = "concatenated", "ndjson_recovery_hit");
        return Some(text);
    }
    if let Some(text) = from_base64_payload(raw) {
        debug!(strategy = "base64", "ndjson_recovery_hit");
        return Some(text);
    }
    if let Some(text) = from_single_object(raw) {
        debug!(strategy = "single_object", "ndjson_recovery_hit");
        return Some(text);
    }
    None
}

/// Objects glued together without newlines, e.g. `{"response":"A"}{"response":"B"}`.
pub fn from_concatenated_objects(raw: &str) -> Option<String> {
    let normalized = OBJECT_BOUNDARY_RE.replace_all(raw, "}\n{");
    let text: String = normalized
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(GenerateChunk::parse)
        .filter_map(|chunk| chunk.response)
        .collect();
    non_empty(&text)
}

/// The whole body is base64 of an NDJSON stream.
pub fn from_base64_payload(raw: &str) -> Option<String> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if !BASE64_PAYLOAD_RE.is_match(&compact) {
        return None;
    }
    let bytes = decode_base64(&compact)?;
    from_concatenated_objects(&String::from_utf8_lossy(&bytes))
}

/// The whole body is one (possibly pretty-printed) JSON object.
pub fn from_single_object(raw: &str) -> Option<String> {
    let chunk = GenerateChunk::parse(raw.trim())?;
    non_empty(chunk.response.as_deref().unwrap_or(""))
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
