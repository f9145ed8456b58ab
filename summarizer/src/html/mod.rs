//! HTML to readable text.
//!
//! Two interchangeable [`ReadableTextExtractor`]s produce linearized text
//! which then goes through the shared [`post_process`] step:
//! - `dom`: structured walk over a parsed tree (default `dom` feature)
//! - `regex`: substitutions on the raw markup
//!
//! [`ExtractorChain`] tries them in order and keeps the first non-empty
//! result.

#[cfg(feature = "dom")]
pub mod dom;
pub mod fallback;
pub mod postprocess;
pub mod strip;

use tracing::{debug, info};

#[cfg(feature = "dom")]
pub use dom::DomExtractor;
pub use fallback::RegexExtractor;
pub use postprocess::{post_process, ExtractOptions};

/// One strategy for turning HTML into linearized text.
pub trait ReadableTextExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Text with structural line breaks but before post-processing, or
    /// `None` when this strategy cannot run.
    fn linearize(&self, html: &str) -> Option<String>;
}

/// Ordered extractors sharing one set of output options.
pub struct ExtractorChain {
    extractors: Vec<Box<dyn ReadableTextExtractor>>,
    options: ExtractOptions,
}

impl ExtractorChain {
    /// Structured extractor first (when compiled in), regex second.
    pub fn new(options: ExtractOptions) -> Self {
        let mut extractors: Vec<Box<dyn ReadableTextExtractor>> = Vec::new();
        #[cfg(feature = "dom")]
        extractors.push(Box::new(DomExtractor));
        extractors.push(Box::new(RegexExtractor));
        Self::with_extractors(extractors, options)
    }

    pub fn with_extractors(
        extractors: Vec<Box<dyn ReadableTextExtractor>>,
        options: ExtractOptions,
    ) -> Self {
        Self {
            extractors,
            options,
        }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Readable text for `html`; empty when nothing survives.
    pub fn extract(&self, html: &str) -> String {
        if html.trim().is_empty() {
            return String::new();
        }

        for extractor in &self.extractors {
            let Some(raw) = extractor.linearize(html) else {
                debug!(extractor = extractor.name(), "extractor_unavailable");
                continue;
            };

            let text = post_process(&raw, &self.options);
            if !text.is_empty() {
                info!(
                    extractor = extractor.name(),
                    html_length = html.len(),
                    text_length = text.len(),
                    "readable_text_extracted"
                );
                return text;
            }

            debug!(extractor = extractor.name(), "extractor_empty_output");
        }

        String::new()
    }
}

impl Default for ExtractorChain {
    fn default() -> Self {
        Self::new(ExtractOptions::default())
    }
}

/// Extract with the default chain and options.
pub fn extract_readable_text(html: &str) -> String {
    ExtractorChain::default().extract(html)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOISY_EMAIL: &str = r#"<html><head><style>.x{color:red}</style></head><body>
        <p>Your order #1234 has shipped.</p>
        <script>track("open")</script>
        <p>It arrives <b>Thursday</b>.</p>
        <blockquote>Earlier message text</blockquote>
        <p>Unsubscribe</p>
        <p>View in browser</p>
        <p>On Mon, Jan 1, 2024 at 10:00 AM, Shop wrote:</p>
    </body></html>"#;

    fn chains() -> Vec<ExtractorChain> {
        let mut chains = vec![ExtractorChain::with_extractors(
            vec![Box::new(RegexExtractor)],
            ExtractOptions::default(),
        )];
        chains.push(ExtractorChain::default());
        chains
    }

    #[test]
    fn test_every_extractor_drops_hidden_content_and_boilerplate() {
        for chain in chains() {
            let text = chain.extract(NOISY_EMAIL);
            assert!(text.contains("Your order #1234 has shipped."), "{text:?}");
            assert!(text.contains("Thursday"));
            for gone in ["color:red", "track(", "Earlier message", "Unsubscribe", "View in browser", "wrote:"] {
                assert!(!text.contains(gone), "{gone} leaked into {text:?}");
            }
            assert!(!text.contains('<'));
            assert!(!text.starts_with('\n'));
            assert!(!text.ends_with('\n'));
        }
    }

    #[test]
    fn test_output_is_capped() {
        let chain = ExtractorChain::new(ExtractOptions {
            max_chars: 10,
            ..Default::default()
        });
        let html = format!("<p>{}</p>", "x".repeat(100));
        assert_eq!(chain.extract(&html).chars().count(), 10);
    }

    #[test]
    fn test_empty_html() {
        assert_eq!(extract_readable_text("   "), "");
    }

    struct Unavailable;

    impl ReadableTextExtractor for Unavailable {
        fn name(&self) -> &'static str {
            "unavailable"
        }

        fn linearize(&self, _html: &str) -> Option<String> {
            None
        }
    }

    #[test]
    fn test_falls_through_unavailable_extractor() {
        let chain = ExtractorChain::with_extractors(
            vec![Box::new(Unavailable), Box::new(RegexExtractor)],
            ExtractOptions::default(),
        );
        assert_eq!(chain.extract("<p>Hello</p>"), "Hello");
    }

    #[cfg(feature = "dom")]
    #[test]
    fn test_dom_output_falls_back_when_empty() {
        // Everything sits inside a noisy container, so the structured pass
        // yields nothing and the regex pass takes over.
        let html = r#"<body><div class="header-wrap"><p>Only text</p></div></body>"#;
        assert_eq!(extract_readable_text(html), "Only text");
    }
}
