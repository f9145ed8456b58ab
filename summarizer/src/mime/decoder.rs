//! Transfer-encoding and charset decoding for single message parts.
//!
//! Nothing in here fails: undecodable input comes back as the raw body,
//! unknown charsets decode as lossy UTF-8.

use std::sync::LazyLock;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use encoding_rs::{Encoding, UTF_8};
use quoted_printable::ParseMode;
use regex::Regex;
use tracing::debug;

use super::part::{DecodedText, MessagePart};

/// Base64 engine that tolerates missing padding and stray trailing bits.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

static BASE64_BODY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9+/=\s]+$").expect("valid base64 body regex"));

/// Decode one leaf part into text.
pub fn decode_part(part: &MessagePart) -> DecodedText {
    DecodedText {
        text: decode_body(
            &part.body,
            part.transfer_encoding.as_deref(),
            part.content_type.charset(),
        ),
        mime: part.content_type.mime.clone(),
    }
}

/// Decode a body given its transfer encoding and charset.
pub fn decode_body(raw: &str, transfer_encoding: Option<&str>, charset: Option<&str>) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let encoding = transfer_encoding
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty());

    match encoding.as_deref() {
        Some(e) if e.contains("base64") => match decode_base64(raw) {
            Some(bytes) => bytes_to_string(&bytes, charset),
            None => {
                debug!(body_length = raw.len(), "mime_base64_decode_failed");
                raw.to_string()
            }
        },
        Some(e) if e.contains("quoted-printable") => {
            bytes_to_string(&decode_quoted_printable(raw), charset)
        }
        Some(_) => raw.to_string(),
        None => decode_undeclared(raw, charset),
    }
}

/// Bodies with no declared encoding that look like base64 get a best-effort
/// decode. The result is only used when it decodes cleanly in the charset.
fn decode_undeclared(raw: &str, charset: Option<&str>) -> String {
    if !looks_like_base64(raw) {
        return raw.to_string();
    }

    let Some(bytes) = decode_base64(raw) else {
        return raw.to_string();
    };

    let (text, had_errors) = decode_charset(&bytes, charset);
    if had_errors {
        debug!(body_length = raw.len(), "mime_base64_heuristic_rejected");
        raw.to_string()
    } else {
        text
    }
}

/// Base64 alphabet only, with a whitespace-stripped length divisible by four.
pub fn looks_like_base64(raw: &str) -> bool {
    BASE64_BODY_RE.is_match(raw) && strip_whitespace(raw).len() % 4 == 0
}

/// Decode base64 after removing all whitespace.
pub fn decode_base64(raw: &str) -> Option<Vec<u8>> {
    LENIENT_BASE64.decode(strip_whitespace(raw)).ok()
}

/// Decode quoted-printable. Soft line breaks are joined and a `=` that
/// does not start a valid escape is kept as is.
pub fn decode_quoted_printable(raw: &str) -> Vec<u8> {
    match quoted_printable::decode(raw.as_bytes(), ParseMode::Robust) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(body_length = raw.len(), error = %e, "mime_quoted_printable_decode_failed");
            raw.as_bytes().to_vec()
        }
    }
}

/// Decode bytes in the declared charset, falling back to UTF-8.
pub fn bytes_to_string(bytes: &[u8], charset: Option<&str>) -> String {
    decode_charset(bytes, charset).0
}

fn decode_charset(bytes: &[u8], charset: Option<&str>) -> (String, bool) {
    let encoding = charset
        .and_then(|label| Encoding::for_label(label.trim().as_bytes()))
        .unwrap_or(UTF_8);
    let (text, _, had_errors) = encoding.decode(bytes);
    (text.into_owned(), had_errors)
}

fn strip_whitespace(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}
