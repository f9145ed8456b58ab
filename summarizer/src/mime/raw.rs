//! RFC 5322 adapter using mailparse.
//!
//! Converts a raw message into the [`MessagePart`] tree the selector walks.
//! Base64 and quoted-printable bodies are kept encoded so the decoder sees
//! them as transferred; 7bit/8bit/binary bodies are charset-decoded here.

use anyhow::{Context, Result};
use mailparse::body::Body;
use mailparse::{parse_mail, MailHeaderMap, ParsedMail};
use tracing::info;

use super::decoder::bytes_to_string;
use super::part::{ContentType, Disposition, MessagePart};

/// Parsed raw message.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Message-Id header value (without angle brackets)
    pub message_id: Option<String>,
    /// Subject header value
    pub subject: Option<String>,
    /// Root of the MIME structure
    pub root: MessagePart,
}

/// Parse raw RFC 5322 content (headers + body).
pub fn parse_raw_message(raw: &[u8]) -> Result<RawMessage> {
    info!(raw_length = raw.len(), "message_parse_start");

    let mail = parse_mail(raw).context("Failed to parse message")?;

    let message_id = mail
        .headers
        .get_first_value("Message-Id")
        .map(|id| id.trim().trim_matches(|c| c == '<' || c == '>').to_string())
        .filter(|id| !id.is_empty());

    let subject = mail.headers.get_first_value("Subject");

    let root = convert_part(&mail);

    info!(
        message_id = ?message_id,
        has_subject = subject.is_some(),
        root_type = %root.content_type.mime,
        child_count = root.children.len(),
        "message_parse_complete"
    );

    Ok(RawMessage {
        message_id,
        subject,
        root,
    })
}

fn convert_part(mail: &ParsedMail) -> MessagePart {
    let content_type = mail
        .headers
        .get_first_value("Content-Type")
        .map(|v| ContentType::parse(&v))
        .filter(|ct| !ct.mime.is_empty())
        .unwrap_or_else(|| ContentType::parse(&mail.ctype.mimetype));

    let disposition = mail
        .headers
        .get_first_value("Content-Disposition")
        .map(|v| Disposition::parse(&v))
        .unwrap_or_default();

    let transfer_encoding = mail
        .headers
        .get_first_value("Content-Transfer-Encoding")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    if content_type.is_multipart() {
        return MessagePart {
            content_type,
            transfer_encoding,
            disposition,
            body: String::new(),
            children: mail.subparts.iter().map(convert_part).collect(),
        };
    }

    let body = match mail.get_body_encoded() {
        Body::Base64(body) | Body::QuotedPrintable(body) => {
            String::from_utf8_lossy(body.get_raw()).into_owned()
        }
        Body::SevenBit(body) | Body::EightBit(body) => {
            bytes_to_string(body.get_raw(), content_type.charset())
        }
        Body::Binary(body) => bytes_to_string(body.get_raw(), content_type.charset()),
    };

    MessagePart {
        content_type,
        transfer_encoding,
        disposition,
        body,
        children: Vec::new(),
    }
}
