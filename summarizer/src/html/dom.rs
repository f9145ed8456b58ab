//! Structured extraction over a parsed HTML tree (scraper).

use std::sync::LazyLock;

use regex::Regex;
use scraper::{node::Element, ElementRef, Html, Node, Selector};
use tracing::debug;
use url::Url;

use super::ReadableTextExtractor;

/// Non-content nodes, quoted replies and signatures.
const REMOVE_SELECTORS: &str = "script, style, noscript, template, svg, math, \
    iframe, object, embed, canvas, form, nav, header, footer, aside, \
    blockquote, .gmail_quote, #gmail_quote, .moz-cite-prefix, #isForwardContent, #isReplyContent, \
    .moz-signature, .gmail_signature, div.Signature, div.signature";

static NOISE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)banner|nav|menu|footer|header|sidebar|aside|(?:^|[^a-z])ads?(?:[^a-z]|$)|advert|promo|sponsor|social|unsubscribe|preferences|disclaimer|legal|copyright|tracking|view\s+in\s+browser",
    )
    .expect("valid noise regex")
});

static HIDDEN_STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)display\s*:\s*none|visibility\s*:\s*hidden").expect("valid style regex")
});

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid ws regex"));

const HEADINGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];
const BLOCKS: &[&str] = &["p", "div", "section", "article", "main"];

/// Extractor that parses the document and walks its tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct DomExtractor;

impl ReadableTextExtractor for DomExtractor {
    fn name(&self) -> &'static str {
        "dom"
    }

    fn linearize(&self, html: &str) -> Option<String> {
        let mut document = Html::parse_document(html);
        let removed = prune(&mut document);
        let base = base_url(&document);

        let body = Selector::parse("body").expect("Invalid selector");
        let start = document
            .select(&body)
            .next()
            .unwrap_or_else(|| document.root_element());

        let mut walker = Walker {
            out: String::new(),
            base,
        };
        walker.visit_element(start);

        debug!(
            removed_nodes = removed,
            output_length = walker.out.len(),
            "dom_extract_complete"
        );

        Some(walker.out)
    }
}

/// Detach non-content and boilerplate-looking elements. Returns how many.
fn prune(document: &mut Html) -> usize {
    let removal = Selector::parse(REMOVE_SELECTORS).expect("Invalid selector");
    let attributed = Selector::parse("[role], [class], [id]").expect("Invalid selector");

    let mut doomed: Vec<_> = document.select(&removal).map(|el| el.id()).collect();
    doomed.extend(
        document
            .select(&attributed)
            .filter(|el| is_noisy(el.value()))
            .map(|el| el.id()),
    );

    for id in &doomed {
        if let Some(mut node) = document.tree.get_mut(*id) {
            node.detach();
        }
    }

    doomed.len()
}

fn is_noisy(el: &Element) -> bool {
    let signature = format!(
        "{} {} {}",
        el.attr("role").unwrap_or(""),
        el.attr("class").unwrap_or(""),
        el.attr("id").unwrap_or("")
    );
    NOISE_RE.is_match(&signature)
}

fn is_hidden(el: &Element) -> bool {
    if el.attr("hidden").is_some() {
        return true;
    }
    if el
        .attr("aria-hidden")
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    {
        return true;
    }
    el.attr("style")
        .is_some_and(|style| HIDDEN_STYLE_RE.is_match(style))
}

fn base_url(document: &Html) -> Option<Url> {
    let selector = Selector::parse("base[href]").expect("Invalid selector");
    document
        .select(&selector)
        .next()
        .and_then(|base| base.value().attr("href"))
        .and_then(|href| Url::parse(href.trim()).ok())
}

struct Walker {
    out: String,
    base: Option<Url>,
}

impl Walker {
    fn visit_children(&mut self, el: ElementRef<'_>) {
        for child in el.children() {
            match child.value() {
                Node::Text(text) => {
                    let collapsed = WS_RE.replace_all(text, " ");
                    if !collapsed.trim().is_empty() {
                        self.out.push_str(&collapsed);
                    } else if !self.out.is_empty() && !self.out.ends_with(char::is_whitespace) {
                        self.out.push(' ');
                    }
                }
                Node::Element(_) => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        self.visit_element(child_el);
                    }
                }
                _ => {}
            }
        }
    }

    fn visit_element(&mut self, el: ElementRef<'_>) {
        let element = el.value();
        let tag = element.name().to_ascii_lowercase();

        if is_hidden(element) || tag == "head" || tag == "title" {
            return;
        }

        if HEADINGS.contains(&tag.as_str()) || BLOCKS.contains(&tag.as_str()) {
            self.out.push_str("\n\n");
        }

        match tag.as_str() {
            "li" => self.out.push_str("\n- "),
            "br" => {
                self.out.push('\n');
                return;
            }
            "a" => {
                self.visit_link(el);
                return;
            }
            "img" => {
                if let Some(alt) = element.attr("alt").map(str::trim).filter(|a| !a.is_empty()) {
                    self.out.push_str(&format!(" [{alt}] "));
                }
                return;
            }
            "table" => {
                self.visit_table(el);
                return;
            }
            "pre" | "code" => {
                let raw: String = el.text().collect();
                self.out.push_str(&format!("\n\n{}\n\n", raw.trim_end()));
                return;
            }
            _ => {}
        }

        self.visit_children(el);
    }

    fn visit_link(&mut self, el: ElementRef<'_>) {
        let start = self.out.len();
        self.visit_children(el);

        let href = el.value().attr("href").unwrap_or("").trim();
        if href.is_empty() || is_non_web_scheme(href) {
            return;
        }

        let url = self.absolutize(href);
        let text = self.out[start..].trim();
        if !text.is_empty() && !text.contains(&url) && !text.contains(href) {
            self.out.push_str(&format!(" ({url})"));
        }
    }

    fn visit_table(&mut self, el: ElementRef<'_>) {
        let rows = Selector::parse("tr").expect("Invalid selector");
        let cells = Selector::parse("th, td").expect("Invalid selector");

        for row in el.select(&rows) {
            let texts: Vec<String> = row
                .select(&cells)
                .map(|cell| {
                    let text: String = cell.text().collect();
                    WS_RE.replace_all(text.trim(), " ").into_owned()
                })
                .filter(|text| !text.is_empty())
                .collect();
            if !texts.is_empty() {
                self.out.push('\n');
                self.out.push_str(&texts.join(" | "));
            }
        }
        self.out.push('\n');
    }

    fn absolutize(&self, href: &str) -> String {
        let resolved = match &self.base {
            Some(base) => base.join(href),
            None => Url::parse(href),
        };
        resolved
            .map(|url| url.to_string())
            .unwrap_or_else(|_| href.to_string())
    }
}

fn is_non_web_scheme(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    lower.starts_with("javascript:") || lower.starts_with("mailto:") || lower.starts_with("tel:")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linearize(html: &str) -> String {
        DomExtractor.linearize(html).unwrap()
    }

    #[test]
    fn test_removes_non_content_nodes() {
        let text = linearize(
            r#"<html><head><title>Title</title><style>p{}</style></head><body>
                <nav>Home | About</nav>
                <p>Real content</p>
                <script>var x = 1;</script>
                <blockquote type="cite">Old reply</blockquote>
                <div class="gmail_quote">Quoted</div>
                <div class="moz-signature">-- Sig</div>
            </body></html>"#,
        );
        assert!(text.contains("Real content"));
        for gone in ["Title", "Home", "var x", "Old reply", "Quoted", "Sig"] {
            assert!(!text.contains(gone), "{gone} should be removed: {text:?}");
        }
    }

    #[test]
    fn test_removes_noisy_attributed_elements() {
        let text = linearize(
            r#"<body>
                <div class="promo-banner">50% off</div>
                <div id="social-links">Follow us</div>
                <div role="navigation">Nav</div>
                <span class="ad">Buy now</span>
                <div class="content">Invoice attached</div>
                <div class="padding-top">Kept</div>
            </body>"#,
        );
        assert!(text.contains("Invoice attached"));
        assert!(text.contains("Kept"));
        for gone in ["50% off", "Follow us", "Nav", "Buy now"] {
            assert!(!text.contains(gone), "{gone} should be removed: {text:?}");
        }
    }

    #[test]
    fn test_skips_hidden_elements() {
        let text = linearize(
            r#"<body>
                <span style="display: none">preheader</span>
                <span style="VISIBILITY:hidden">ghost</span>
                <p hidden>secret</p>
                <div aria-hidden="true">aria</div>
                <p>shown</p>
            </body>"#,
        );
        assert!(text.contains("shown"));
        for gone in ["preheader", "ghost", "secret", "aria"] {
            assert!(!text.contains(gone));
        }
    }

    #[test]
    fn test_structure_markers() {
        let text = linearize("<body><h2>Agenda</h2><ul><li>One</li><li>Two</li></ul><p>a<br>b</p></body>");
        assert!(text.contains("\n\nAgenda"));
        assert!(text.contains("\n- One"));
        assert!(text.contains("\n- Two"));
        assert!(text.contains("a\nb"));
    }

    #[test]
    fn test_links() {
        let text = linearize(
            r#"<body>
                <a href="https://example.com/report">the report</a>
                <a href="https://example.com/x">https://example.com/x</a>
                <a href="mailto:bob@example.com">Bob</a>
                <a href="javascript:void(0)">Click</a>
                <a href="/relative">relative</a>
            </body>"#,
        );
        assert!(text.contains("the report (https://example.com/report)"));
        assert!(!text.contains("https://example.com/x (https://example.com/x)"));
        assert!(!text.contains("mailto:"));
        assert!(!text.contains("javascript:"));
        assert!(text.contains("relative (/relative)"));
    }

    #[test]
    fn test_links_resolve_against_base() {
        let text = linearize(
            r#"<html><head><base href="https://news.example.com/issue/"></head>
            <body><a href="story-1">Story</a></body></html>"#,
        );
        assert!(text.contains("Story (https://news.example.com/issue/story-1)"));
    }

    #[test]
    fn test_images_use_alt_text() {
        let text = linearize(r#"<body><img src="a.png" alt=" Logo "><img src="b.png" alt=""><img src="c.png"></body>"#);
        assert_eq!(text.trim(), "[Logo]");
    }

    #[test]
    fn test_tables_become_rows() {
        let text = linearize(
            "<body><table><tr><th>Item</th><th>Qty</th></tr><tr><td>Apples</td><td></td><td>3</td></tr></table></body>",
        );
        assert!(text.contains("\nItem | Qty"));
        assert!(text.contains("\nApples | 3"));
    }

    #[test]
    fn test_preformatted_verbatim() {
        let text = linearize("<body><pre>fn main() {\n    run();\n}\n\n</pre></body>");
        assert!(text.contains("\n\nfn main() {\n    run();\n}\n\n"));
    }
}
