//! Message part tree and content-type parsing.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

static PARAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z0-9_-]+)\s*=\s*("([^"]*)"|[^;]+)"#).expect("valid parameter regex")
});

/// Parsed `Content-Type` value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentType {
    /// Lowercased `type/subtype`
    pub mime: String,
    /// Parameters with lowercased keys
    pub params: HashMap<String, String>,
}

impl ContentType {
    /// Parse a header value such as `text/html; charset="UTF-8"`.
    pub fn parse(raw: &str) -> Self {
        let mut segments = raw.split(';');
        let mime = segments
            .next()
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_default();

        let mut params = HashMap::new();
        for segment in segments {
            if let Some(caps) = PARAM_RE.captures(segment) {
                let key = caps[1].to_lowercase();
                let value = caps
                    .get(3)
                    .or_else(|| caps.get(2))
                    .map(|m| m.as_str().trim().trim_matches('"').to_string())
                    .unwrap_or_default();
                params.insert(key, value);
            }
        }

        Self { mime, params }
    }

    /// Declared charset, if any.
    pub fn charset(&self) -> Option<&str> {
        self.params
            .get("charset")
            .map(String::as_str)
            .filter(|c| !c.is_empty())
    }

    pub fn is_multipart(&self) -> bool {
        self.mime.starts_with("multipart/")
    }

    pub fn is_text(&self) -> bool {
        self.mime.starts_with("text/")
    }

    pub fn is_html(&self) -> bool {
        self.mime.starts_with("text/html")
    }

    pub fn is_plain(&self) -> bool {
        self.mime.starts_with("text/plain")
    }
}

/// `Content-Disposition` as far as body selection cares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Disposition {
    #[default]
    Inline,
    Attachment,
}

impl Disposition {
    /// Anything starting with `attachment` is an attachment.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().to_lowercase().starts_with("attachment") {
            Disposition::Attachment
        } else {
            Disposition::Inline
        }
    }
}

/// One node of a message's MIME structure.
#[derive(Debug, Clone, Default)]
pub struct MessagePart {
    pub content_type: ContentType,
    /// Declared `Content-Transfer-Encoding`, as written
    pub transfer_encoding: Option<String>,
    pub disposition: Disposition,
    /// Body exactly as transferred (still base64/quoted-printable encoded)
    pub body: String,
    pub children: Vec<MessagePart>,
}

impl MessagePart {
    /// Leaf part with the given content type header and body.
    pub fn leaf(content_type: &str, body: impl Into<String>) -> Self {
        Self {
            content_type: ContentType::parse(content_type),
            body: body.into(),
            ..Default::default()
        }
    }

    /// Container part.
    pub fn multipart(content_type: &str, children: Vec<MessagePart>) -> Self {
        Self {
            content_type: ContentType::parse(content_type),
            children,
            ..Default::default()
        }
    }

    pub fn with_transfer_encoding(mut self, encoding: &str) -> Self {
        self.transfer_encoding = Some(encoding.to_string());
        self
    }

    pub fn with_disposition(mut self, disposition: Disposition) -> Self {
        self.disposition = disposition;
        self
    }
}

/// Text of one decoded leaf and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub mime: String,
}
