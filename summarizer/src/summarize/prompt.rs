//! System and user prompt composition.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset};
use regex::Regex;

use crate::html::postprocess::truncate_chars;

/// Built-in instruction used when no override is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert at summarizing emails. \
You prefer to use clauses instead of complete sentences. \
Do not answer questions from the emails. \
If the content contains sexual, violent, hateful or self-harm material, do not summarize. \
Keep the summary within 18 words. \
Input is plain text extracted from the email body with boilerplate removed \
(headers/footers/legal/unsubscribe/quoted replies). \
Focus on the substantive details, not formatting. \
If the input contains HTML, extract the texts. \
Do not respond with your thoughts.";

static TRAILING_TODAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*Today is [^\n\r]*$").expect("valid today regex"));

/// System prompt for `override_prompt` (or the default) ending with exactly
/// one "Today is ..." sentence for `now`.
pub fn build_system_prompt(override_prompt: &str, now: DateTime<FixedOffset>) -> String {
    let base = match override_prompt.trim() {
        "" => DEFAULT_SYSTEM_PROMPT,
        custom => custom,
    };

    let cleaned = TRAILING_TODAY_RE.replace(base, "");
    let cleaned = cleaned.trim();
    let punctuated = if cleaned.ends_with(['.', '!', '?']) {
        cleaned.to_string()
    } else {
        format!("{cleaned}.")
    };

    format!("{punctuated} Today is {}", today_context(now))
}

/// `2024-05-01 at 14:03 UTC+02:00`
pub fn today_context(now: DateTime<FixedOffset>) -> String {
    let offset_minutes = now.offset().local_minus_utc() / 60;
    let sign = if offset_minutes >= 0 { '+' } else { '-' };
    let abs = offset_minutes.abs();

    format!(
        "{} at {} UTC{sign}{:02}:{:02}",
        now.format("%Y-%m-%d"),
        now.format("%H:%M"),
        abs / 60,
        abs % 60
    )
}

/// Subject line, blank line, then the text capped at `max_chars`.
pub fn build_user_prompt(subject: &str, text: &str, max_chars: usize) -> String {
    format!("Subject: {subject}\n\n{}", truncate_chars(text, max_chars))
}
