//! Regex extractor for when no structured parser is available.
//!
//! Approximates the DOM walk with substitutions on the raw markup: same
//! removals and block separation, no attribute heuristics, no link URLs.

use super::strip::{decode_entities, linearize_tags, remove_chrome, remove_non_content};
use super::ReadableTextExtractor;

#[derive(Debug, Default, Clone, Copy)]
pub struct RegexExtractor;

impl ReadableTextExtractor for RegexExtractor {
    fn name(&self) -> &'static str {
        "regex"
    }

    fn linearize(&self, html: &str) -> Option<String> {
        let stripped = remove_chrome(&remove_non_content(html));
        Some(decode_entities(&linearize_tags(&stripped)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regex_extractor_structure() {
        let text = RegexExtractor
            .linearize(
                "<head><title>x</title></head><nav>Menu</nav><div>First &amp; best</div><ul><li>Item</li></ul><p>a<br/>b</p>",
            )
            .unwrap();
        assert!(!text.contains("Menu"));
        assert!(!text.contains('x'));
        assert!(text.contains("First & best"));
        assert!(text.contains("\n- Item"));
        assert!(text.contains("a\nb"));
        assert!(!text.contains('<'));
    }
}
