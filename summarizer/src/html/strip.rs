//! Pattern-based HTML stripping.
//!
//! Used both to rank HTML candidates by visible text and by the regex
//! extractor when no structured parser is available.

use std::sync::LazyLock;

use regex::Regex;

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid strip regex")
}

static STYLE_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?is)<style\b.*?</style\s*>"));
static SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?is)<script\b.*?</script\s*>"));
static HEAD_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?is)<head\b.*?</head\s*>"));
static BLOCKQUOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?is)<blockquote\b.*?</blockquote\s*>"));
static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?s)<!--.*?-->"));
static BR_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)<br\s*/?>"));
static BLOCK_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)</(?:p|div|section|article|main)\s*>"));
static LI_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)<li\b[^>]*>"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| re(r"<[^>]+>"));
static HSPACE_RE: LazyLock<Regex> = LazyLock::new(|| re(r"[ \t]+"));
static NEWLINE_INDENT_RE: LazyLock<Regex> = LazyLock::new(|| re(r"\n\s+"));

/// Regex has no backreferences, so each boilerplate container gets its own.
static CHROME_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ["nav", "header", "footer", "aside", "form"]
        .iter()
        .map(|tag| re(&format!(r"(?is)<{tag}\b.*?</{tag}\s*>")))
        .collect()
});

/// Remove blocks whose content never counts as message text.
pub fn remove_non_content(html: &str) -> String {
    let mut out = COMMENT_RE.replace_all(html, " ").into_owned();
    for pattern in [&*STYLE_RE, &*SCRIPT_RE, &*HEAD_RE, &*BLOCKQUOTE_RE] {
        out = pattern.replace_all(&out, " ").into_owned();
    }
    out
}

/// Remove navigation, header, footer, aside and form blocks.
pub fn remove_chrome(html: &str) -> String {
    let mut out = html.to_string();
    for pattern in CHROME_RES.iter() {
        out = pattern.replace_all(&out, " ").into_owned();
    }
    out
}

/// Turn breaks, block ends and list items into text structure, then drop
/// every remaining tag.
pub fn linearize_tags(html: &str) -> String {
    let out = BR_RE.replace_all(html, "\n");
    let out = BLOCK_CLOSE_RE.replace_all(&out, "\n\n");
    let out = LI_RE.replace_all(&out, "\n- ");
    TAG_RE.replace_all(&out, " ").into_owned()
}

/// Rough visible text: non-content removed, tags dropped, whitespace collapsed.
pub fn strip_html_to_text(html: &str) -> String {
    let out = linearize_tags(&remove_non_content(html));
    let out = HSPACE_RE.replace_all(&out, " ");
    let out = NEWLINE_INDENT_RE.replace_all(&out, "\n");
    out.trim().to_string()
}

/// Character count of [`strip_html_to_text`].
pub fn visible_text_len(html: &str) -> usize {
    strip_html_to_text(html).chars().count()
}

/// Decode the handful of entities that matter for readable text.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Escape plain text and wrap it as a minimal HTML document.
pub fn text_to_html(text: &str) -> String {
    let escaped = text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;");
    let with_breaks = escaped
        .replace("\r\n", "<br>")
        .replace("\n\r", "<br>")
        .replace(['\n', '\r'], "<br>");
    format!("<div>{with_breaks}</div>")
}
