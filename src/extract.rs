//! Title and body extraction from unstructured article HTML.
//!
//! Extraction runs an ordered list of [`Strategy`] values against the parsed
//! document. Each scoped strategy adds the paragraphs it matches to an
//! accumulator; once the accumulated text satisfies the profile's sufficiency
//! threshold no further strategies are tried. If every scoped strategy comes up
//! empty, a last-resort strategy takes every paragraph long enough to look like
//! prose.
//!
//! Two [`ExtractionProfile`]s exist:
//!
//! | Profile | Used by | Body shape |
//! |---------|---------|------------|
//! | [`ExtractionProfile::ingest`] | ingest job | paragraphs separated by `\n\n` |
//! | [`ExtractionProfile::competitor`] | competitor scraping | single whitespace-collapsed blob, capped |

use crate::models::ExtractedContent;
use crate::utils::{collapse_whitespace, truncate_chars};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, instrument, warn};

/// Paragraphs at least this long are always considered real content.
pub const MIN_PARAGRAPH_CHARS: usize = 50;

/// One step of the body extraction sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Paragraphs under a content scope, e.g. `article p`, keeping those whose
    /// trimmed text has more than `min_chars` characters.
    Scoped { selector: String, min_chars: usize },
    /// Every `<p>` in the document whose trimmed text has at least
    /// `min_chars` characters.
    AnyParagraph { min_chars: usize },
}

/// How to turn a page into [`ExtractedContent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionProfile {
    /// Tried in order until the accumulated body is sufficient.
    pub strategies: Vec<Strategy>,
    /// Used only when `strategies` produced nothing.
    pub fallback: Strategy,
    /// Accumulated characters at which no further strategies are tried.
    pub sufficient_chars: usize,
    /// Collapse all whitespace into single spaces (single-blob output).
    pub collapse_whitespace: bool,
    pub max_body_chars: Option<usize>,
    pub max_title_chars: Option<usize>,
    pub untitled: &'static str,
}

impl ExtractionProfile {
    /// Multi-paragraph extraction for articles on the listing site.
    pub fn ingest() -> Self {
        let scoped = |selector: &str| Strategy::Scoped {
            selector: selector.to_string(),
            min_chars: 0,
        };
        Self {
            strategies: vec![
                scoped("article p"),
                scoped(".post-content p"),
                scoped(".entry-content p"),
                scoped(".content p"),
                scoped("main p"),
            ],
            fallback: Strategy::AnyParagraph {
                min_chars: MIN_PARAGRAPH_CHARS,
            },
            sufficient_chars: 200,
            collapse_whitespace: false,
            max_body_chars: None,
            max_title_chars: None,
            untitled: "Untitled Article",
        }
    }

    /// Single-blob extraction for competitor pages, capped to keep the rewrite
    /// prompt bounded.
    pub fn competitor() -> Self {
        let scoped = |selector: &str| Strategy::Scoped {
            selector: selector.to_string(),
            min_chars: 30,
        };
        Self {
            strategies: vec![
                scoped("article p"),
                scoped(".post-content p"),
                scoped(".content p"),
                scoped(".entry-content p"),
                scoped(".article-body p"),
                scoped("main p"),
            ],
            fallback: Strategy::AnyParagraph {
                min_chars: MIN_PARAGRAPH_CHARS,
            },
            sufficient_chars: 500,
            collapse_whitespace: true,
            max_body_chars: Some(5000),
            max_title_chars: Some(200),
            untitled: "Untitled",
        }
    }
}

/// Extract `{title, body}` from raw HTML using `profile`.
///
/// `url` is only used for diagnostics. The body is empty only when the page
/// has no usable paragraphs at all.
#[instrument(level = "debug", skip(html, profile), fields(bytes = html.len()))]
pub fn extract(html: &str, url: &str, profile: &ExtractionProfile) -> ExtractedContent {
    let document = Html::parse_document(html);

    let mut title = resolve_title(&document).unwrap_or_else(|| profile.untitled.to_string());
    if let Some(max) = profile.max_title_chars {
        title = truncate_chars(&title, max).to_string();
    }

    // A paragraph matched by more than one selector (e.g. both `article p` and
    // `main p`) is kept once.
    let mut seen = HashSet::new();
    let mut texts: Vec<String> = Vec::new();
    for strategy in &profile.strategies {
        for (el, text) in matching_paragraphs(&document, strategy) {
            if seen.insert(el.id()) {
                texts.push(text);
            }
        }
        let chars = joined_chars(&texts);
        if chars >= profile.sufficient_chars {
            debug!(?strategy, chars, "Extraction sufficient");
            break;
        }
    }
    if texts.is_empty() {
        texts = matching_paragraphs(&document, &profile.fallback)
            .into_iter()
            .map(|(_, text)| text)
            .collect();
    }
    if texts.is_empty() {
        warn!(%url, "No paragraph content found");
    }

    let mut body = if profile.collapse_whitespace {
        collapse_whitespace(&texts.join(" "))
    } else {
        texts.join("\n\n")
    };
    if let Some(max) = profile.max_body_chars {
        body = truncate_chars(&body, max).trim_end().to_string();
    }

    ExtractedContent { title, body }
}

/// First non-empty of: `h1`, `og:title`, `<title>`.
fn resolve_title(document: &Html) -> Option<String> {
    first_text(document, "h1")
        .or_else(|| first_attr(document, r#"meta[property="og:title"]"#, "content"))
        .or_else(|| first_text(document, "title"))
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .map(|el| element_text(&el))
        .find(|text| !text.is_empty())
}

fn first_attr(document: &Html, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr(attr))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

fn element_text(el: &ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Elements selected by `strategy` together with their trimmed text, in
/// document order, after the strategy's length filter.
fn matching_paragraphs<'a>(document: &'a Html, strategy: &Strategy) -> Vec<(ElementRef<'a>, String)> {
    let (selector, min_chars, inclusive) = match strategy {
        Strategy::Scoped {
            selector,
            min_chars,
        } => (selector.as_str(), *min_chars, false),
        Strategy::AnyParagraph { min_chars } => ("p", *min_chars, true),
    };
    let Ok(selector) = Selector::parse(selector) else {
        warn!(selector, "Invalid extraction selector; skipping");
        return Vec::new();
    };
    document
        .select(&selector)
        .map(|el| (el, element_text(&el)))
        .filter(|(_, text)| {
            let len = text.chars().count();
            len > 0 && if inclusive { len >= min_chars } else { len > min_chars }
        })
        .collect()
}

/// Character count of `texts` joined with `\n\n`.
fn joined_chars(texts: &[String]) -> usize {
    let content: usize = texts.iter().map(|t| t.chars().count()).sum();
    content + 2 * texts.len().saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long(prefix: &str) -> String {
        format!("{} {}", prefix, "lorem ipsum dolor sit amet ".repeat(4))
    }

    #[test]
    fn test_title_prefers_h1_then_title_tag() {
        let html = "<html><head><title>Doc Title</title></head><body><h1> Heading </h1></body></html>";
        let out = extract(html, "u", &ExtractionProfile::ingest());
        assert_eq!(out.title, "Heading");

        let html = "<html><head><title>Doc Title</title></head><body><h1>  </h1></body></html>";
        let out = extract(html, "u", &ExtractionProfile::ingest());
        assert_eq!(out.title, "Doc Title");
    }

    #[test]
    fn test_title_uses_og_title_before_document_title() {
        let html = r#"<html><head><title>Doc</title><meta property="og:title" content="OG Title"></head><body></body></html>"#;
        let out = extract(html, "u", &ExtractionProfile::competitor());
        assert_eq!(out.title, "OG Title");
    }

    #[test]
    fn test_untitled_defaults_per_profile() {
        let html = "<html><body><p>x</p></body></html>";
        assert_eq!(extract(html, "u", &ExtractionProfile::ingest()).title, "Untitled Article");
        assert_eq!(extract(html, "u", &ExtractionProfile::competitor()).title, "Untitled");
    }

    #[test]
    fn test_ingest_keeps_paragraph_breaks() {
        let html = "<html><body><article><p>First paragraph.</p><p>Second\n paragraph.</p></article></body></html>";
        let out = extract(html, "u", &ExtractionProfile::ingest());
        assert_eq!(out.body, "First paragraph.\n\nSecond\n paragraph.");
    }

    #[test]
    fn test_overlapping_selectors_do_not_duplicate() {
        let html = "<html><body><main><article><p>Only once.</p></article></main></body></html>";
        let out = extract(html, "u", &ExtractionProfile::ingest());
        assert_eq!(out.body, "Only once.");
    }

    #[test]
    fn test_stops_after_sufficient_selector() {
        let article_text = "a".repeat(250);
        let html = format!(
            "<html><body><article><p>{}</p></article><div class=\"content\"><p>Sidebar text</p></div></body></html>",
            article_text
        );
        let out = extract(&html, "u", &ExtractionProfile::ingest());
        assert_eq!(out.body, article_text);
    }

    #[test]
    fn test_continues_when_first_selector_insufficient() {
        let html = "<html><body><article><p>Short intro.</p></article><div class=\"content\"><p>More body.</p></div></body></html>";
        let out = extract(html, "u", &ExtractionProfile::ingest());
        assert_eq!(out.body, "Short intro.\n\nMore body.");
    }

    #[test]
    fn test_fallback_to_long_paragraphs() {
        let para = long("Standalone");
        let html = format!(
            "<html><body><div><p>tiny</p><p>{}</p></div></body></html>",
            para
        );
        let out = extract(&html, "u", &ExtractionProfile::ingest());
        assert_eq!(out.body, para.trim());
    }

    #[test]
    fn test_never_empty_when_a_fifty_char_paragraph_exists() {
        let para = "x".repeat(MIN_PARAGRAPH_CHARS);
        let html = format!("<html><body><section><p>{}</p></section></body></html>", para);
        for profile in [ExtractionProfile::ingest(), ExtractionProfile::competitor()] {
            let out = extract(&html, "u", &profile);
            assert!(!out.body.is_empty());
        }
    }

    #[test]
    fn test_empty_page_gives_empty_body() {
        let out = extract("<html><body><div>no paragraphs</div></body></html>", "u", &ExtractionProfile::ingest());
        assert!(out.body.is_empty());
    }

    #[test]
    fn test_competitor_collapses_whitespace_and_filters_short() {
        let html = format!(
            "<html><body><article><p>Too short</p><p>{}\n\n   tail</p><p>{}</p></article></body></html>",
            long("One"),
            long("Two")
        );
        let out = extract(&html, "u", &ExtractionProfile::competitor());
        assert!(!out.body.contains('\n'));
        assert!(!out.body.contains("  "));
        assert!(!out.body.contains("Too short"));
        assert!(out.body.starts_with("One lorem"));
        assert!(out.body.contains("tail Two lorem"));
    }

    #[test]
    fn test_competitor_caps_title_and_body() {
        let title = "T".repeat(300);
        let paragraphs: String = (0..200).map(|i| format!("<p>{}</p>", long(&i.to_string()))).collect();
        let html = format!("<html><body><h1>{}</h1><article>{}</article></body></html>", title, paragraphs);
        let out = extract(&html, "u", &ExtractionProfile::competitor());
        assert_eq!(out.title.chars().count(), 200);
        assert!(out.body.chars().count() <= 5000);
        assert!(out.body.chars().count() > 4900);
    }
}
