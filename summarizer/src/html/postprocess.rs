//! Line-level cleanup shared by every extractor.

use std::sync::LazyLock;

use regex::Regex;

static HSPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("valid whitespace regex"));

static BOILERPLATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(unsubscribe|manage\s+preferences|view\s+in\s+browser|privacy\s+policy|terms\s+of\s+service|do\s+not\s+reply|do-not-reply|confidentiality\s+notice|copyright\s+\d{4}|all\s+rights\s+reserved|click\s+here\s+to\s+unsubscribe)",
    )
    .expect("valid boilerplate regex")
});

static URL_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://").expect("valid url regex"));

static REPLY_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^on\s+\w{3},?\s+\w{3}\s+\d{1,2},\s+\d{4}.*wrote:$")
        .expect("valid reply header regex")
});

static QUOTED_FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(from|sent|to|subject):").expect("valid field regex"));

/// Tunables for extraction output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Output is cut to this many characters
    pub max_chars: usize,
    /// URL-only lines longer than this are treated as tracking links
    pub tracking_url_min_len: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_chars: 120_000,
            tracking_url_min_len: 200,
        }
    }
}

/// Normalize whitespace and drop boilerplate, tracking and reply-header lines.
pub fn post_process(text: &str, options: &ExtractOptions) -> String {
    if text.is_empty() {
        return String::new();
    }

    let normalized = HSPACE_RE.replace_all(text, " ");
    let mut kept: Vec<&str> = Vec::new();

    for line in normalized.lines() {
        let line = line.trim();
        if line.is_empty() {
            // One blank line between paragraphs at most.
            if kept.last().is_some_and(|prev| !prev.is_empty()) {
                kept.push("");
            }
            continue;
        }
        if is_noise_line(line, options) {
            continue;
        }
        kept.push(line);
    }

    while kept.last().is_some_and(|l| l.is_empty()) {
        kept.pop();
    }

    truncate_chars(&kept.join("\n"), options.max_chars)
}

fn is_noise_line(line: &str, options: &ExtractOptions) -> bool {
    BOILERPLATE_RE.is_match(line)
        || (URL_LINE_RE.is_match(line) && line.chars().count() > options.tracking_url_min_len)
        || REPLY_HEADER_RE.is_match(line)
        || QUOTED_FIELD_RE.is_match(line)
}

/// Cut to at most `max` characters on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str) -> String {
        post_process(text, &ExtractOptions::default())
    }

    #[test]
    fn test_collapses_blank_runs_and_trims() {
        let text = "\n\n  Hello   world \t\n\n\n\n\nSecond\n\n";
        assert_eq!(run(text), "Hello world\n\nSecond");
    }

    #[test]
    fn test_drops_boilerplate_lines() {
        let text = "Meeting moved to 3pm\nUnsubscribe\nView in browser\nCopyright 2024 Acme\nAll rights reserved.\nSee you";
        assert_eq!(run(text), "Meeting moved to 3pm\nSee you");
    }

    #[test]
    fn test_drops_reply_headers() {
        let text = "Sounds good.\n\nOn Mon, Jan 1, 2024 at 9:00 AM, Jane Doe <jane@example.com> wrote:\nFrom: Jane\nSent: Monday\nTo: Bob\nSubject: Re: plan\nOld stuff";
        let out = run(text);
        assert!(out.starts_with("Sounds good."));
        assert!(!out.contains("wrote:"));
        assert!(!out.contains("From:"));
        assert!(!out.contains("Subject:"));
        assert!(out.ends_with("Old stuff"));
    }

    #[test]
    fn test_drops_long_tracking_urls_only() {
        let long = format!("https://track.example.com/{}", "x".repeat(200));
        let text = format!("Intro\n{long}\nhttps://example.com/short");
        assert_eq!(run(&text), "Intro\nhttps://example.com/short");
    }

    #[test]
    fn test_blank_runs_left_by_dropped_lines_collapse() {
        let text = "A\n\nunsubscribe here\n\nB";
        assert_eq!(run(text), "A\n\nB");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn test_output_is_capped() {
        let options = ExtractOptions {
            max_chars: 5,
            ..Default::default()
        };
        assert_eq!(post_process("abcdefgh", &options), "abcde");
    }
}
