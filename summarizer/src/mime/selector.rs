//! Body selection across a message's part tree.
//!
//! Handles the usual structures:
//! - text/html alone
//! - multipart/alternative (richest HTML rendition wins)
//! - multipart/mixed and multipart/related nesting
//! - text/plain only (escaped and wrapped as HTML)

use tracing::{debug, info};

use super::decoder::decode_part;
use super::part::{Disposition, MessagePart};
use crate::html::strip::{text_to_html, visible_text_len};

#[derive(Default)]
struct Candidates {
    html: Vec<String>,
    plain: Option<String>,
}

/// Pick the HTML body to summarize, or `None` when the message has no
/// usable body.
pub fn select_body(root: &MessagePart) -> Option<String> {
    let mut candidates = Candidates::default();
    visit(root, &mut candidates);

    info!(
        html_candidates = candidates.html.len(),
        has_plain = candidates.plain.is_some(),
        "body_candidates_collected"
    );

    if let Some(html) = richest_html(candidates.html) {
        return Some(html);
    }

    candidates.plain.map(|text| text_to_html(&text))
}

fn visit(part: &MessagePart, candidates: &mut Candidates) {
    let ct = &part.content_type;

    if part.disposition == Disposition::Attachment && !ct.is_text() {
        debug!(content_type = %ct.mime, "body_skip_attachment");
        return;
    }

    if ct.is_multipart() {
        for child in &part.children {
            visit(child, candidates);
        }
        return;
    }

    if ct.is_html() {
        let decoded = decode_part(part);
        if !decoded.text.trim().is_empty() {
            candidates.html.push(decoded.text);
        }
    } else if ct.is_plain() && candidates.plain.is_none() {
        let decoded = decode_part(part);
        if !decoded.text.is_empty() {
            candidates.plain = Some(decoded.text);
        }
    }
}

/// Greatest visible text length; the first candidate wins ties.
fn richest_html(candidates: Vec<String>) -> Option<String> {
    let mut best: Option<(usize, String)> = None;

    for html in candidates {
        let len = visible_text_len(&html);
        debug!(visible_length = len, html_length = html.len(), "body_html_candidate");
        match &best {
            Some((best_len, _)) if *best_len >= len => {}
            _ => best = Some((len, html)),
        }
    }

    best.map(|(_, html)| html)
}
