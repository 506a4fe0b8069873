//! Page metadata extraction
//!
//! Pulls title/description/image candidates out of an article page:
//! Open-Graph tags first, then the conventional HTML fallbacks. Selectors are
//! compiled once and reused across every page a worker touches.
//!
//! Malformed HTML is not an error here: scraper parses leniently, and a page
//! that yields no usable tags simply produces an empty [`PageMeta`].

use scraper::{Html, Selector};
use url::Url;

/// Metadata candidates discovered on one article page
///
/// Empty fields mean "nothing found"; callers keep their existing value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMeta {
    pub title: String,
    pub description: String,
    pub image_url: String,
}

/// Pre-compiled selectors for metadata extraction
pub struct MetaSelectors {
    og_title: Selector,
    og_description: Selector,
    og_image: Selector,
    html_title: Selector,
    meta_description: Selector,
}

impl MetaSelectors {
    #[must_use]
    pub fn new() -> Self {
        Self {
            og_title: parse_selector(r#"meta[property="og:title"]"#),
            og_description: parse_selector(r#"meta[property="og:description"]"#),
            og_image: parse_selector(r#"meta[property="og:image"]"#),
            html_title: parse_selector("title"),
            meta_description: parse_selector(r#"meta[name="description"]"#),
        }
    }

    /// Extract metadata from a page body
    ///
    /// Precedence: og:title over `<title>`; og:description over
    /// `meta[name=description]`; image from og:image only.
    pub fn extract(&self, body: &str) -> PageMeta {
        let document = Html::parse_document(body);

        let title = first_non_empty(
            content_attr(&document, &self.og_title),
            element_text(&document, &self.html_title),
        );
        let description = first_non_empty(
            content_attr(&document, &self.og_description),
            content_attr(&document, &self.meta_description),
        );
        let image_url = content_attr(&document, &self.og_image);

        PageMeta {
            title,
            description,
            image_url,
        }
    }
}

impl Default for MetaSelectors {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_selector(selector: &str) -> Selector {
    Selector::parse(selector).expect("invalid CSS selector literal")
}

fn content_attr(document: &Html, selector: &Selector) -> String {
    document
        .select(selector)
        .next()
        .and_then(|node| node.value().attr("content"))
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

fn element_text(document: &Html, selector: &Selector) -> String {
    document
        .select(selector)
        .next()
        .map(|node| node.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

fn first_non_empty(primary: String, fallback: String) -> String {
    if primary.is_empty() {
        fallback
    } else {
        primary
    }
}

/// Resolve a possibly-relative URL against the page it was found on
///
/// Unparseable inputs are returned unchanged; a wrong image URL is better
/// than a dropped one.
pub fn resolve_url(raw: &str, base: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    if let Ok(absolute) = Url::parse(raw) {
        return absolute.to_string();
    }
    match Url::parse(base).and_then(|b| b.join(raw)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => raw.to_string(),
    }
}
