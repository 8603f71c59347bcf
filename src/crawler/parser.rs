//! HTML parser for extracting mirrorable links
//!
//! This module decides which element attributes carry links, pulls their
//! values out of a document, and normalizes them into absolute in-scope URLs.

use crate::url::{normalize_link, CrawlScope};
use scraper::{Html, Selector};
use std::borrow::Cow;
use std::collections::HashSet;
use url::Url;

/// Element names and the attributes on them that carry links
pub const LINK_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("a", &["href"]),
    ("link", &["href"]),
    ("img", &["src", "srcset"]),
    ("script", &["src"]),
    ("iframe", &["src"]),
    ("source", &["src", "srcset"]),
    ("video", &["src", "poster"]),
    ("audio", &["src"]),
    ("embed", &["src"]),
];

/// Returns the link-carrying attributes of an element, if it has any
pub fn link_attributes_for(tag: &str) -> Option<&'static [&'static str]> {
    LINK_ATTRIBUTES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(tag))
        .map(|(_, attrs)| *attrs)
}

/// Splits a `srcset` value into its URL candidates
///
/// Each comma-separated candidate is `URL [descriptor]`; only the URL part is
/// returned.
///
/// # Examples
///
/// ```
/// use site_mirror::crawler::parse_srcset;
///
/// assert_eq!(parse_srcset("/a.png 1x, /b.png 2x"), vec!["/a.png", "/b.png"]);
/// ```
pub fn parse_srcset(value: &str) -> Vec<&str> {
    value
        .split(',')
        .filter_map(|candidate| candidate.split_whitespace().next())
        .collect()
}

/// Extracts and normalizes links within a crawl scope
#[derive(Debug, Clone)]
pub struct LinkParser {
    scope: CrawlScope,
}

impl LinkParser {
    /// Creates a parser that keeps links inside `scope`
    pub fn new(scope: CrawlScope) -> Self {
        Self { scope }
    }

    /// The crawl scope links are filtered to
    pub fn scope(&self) -> &CrawlScope {
        &self.scope
    }

    /// Normalizes one raw reference found in a document at `base`
    pub fn normalize(&self, raw: &str, base: &Url) -> Option<Url> {
        normalize_link(raw, base, &self.scope)
    }

    /// Extracts every in-scope link from an HTML document
    ///
    /// # Arguments
    ///
    /// * `content` - The raw document bytes
    /// * `base` - The document's own URL, used to resolve relative references
    ///
    /// Returns absolute URLs in document order, without duplicates.
    ///
    /// Bytes that are not valid UTF-8 (a Latin-1 page, say) are decoded
    /// lossily. Only link values have to survive decoding, and those are
    /// ASCII in practice. Malformed markup is recovered by the HTML5 parser,
    /// so extraction never fails.
    ///
    /// # Example
    ///
    /// ```
    /// use site_mirror::crawler::LinkParser;
    /// use site_mirror::url::CrawlScope;
    /// use url::Url;
    ///
    /// let base = Url::parse("https://example.com/").unwrap();
    /// let parser = LinkParser::new(CrawlScope::from_root(&base).unwrap());
    ///
    /// let html = br#"<a href="/a">A</a><a href="https://other.com/">B</a>"#;
    /// let links = parser.extract_links(html, &base);
    /// assert_eq!(links.len(), 1);
    /// assert_eq!(links[0].as_str(), "https://example.com/a");
    /// ```
    pub fn extract_links(&self, content: &[u8], base: &Url) -> Vec<Url> {
        let text = String::from_utf8_lossy(content);
        if matches!(text, Cow::Owned(_)) {
            tracing::debug!("{} is not valid UTF-8, decoding lossily", base);
        }

        let document = Html::parse_document(&text);

        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for raw in raw_references(&document) {
            if let Some(url) = self.normalize(raw, base) {
                if seen.insert(url.as_str().to_string()) {
                    links.push(url);
                }
            }
        }

        links
    }
}

/// Collects raw link values in document order
fn raw_references(document: &Html) -> Vec<&str> {
    let mut references = Vec::new();

    let Ok(all) = Selector::parse("*") else {
        return references;
    };

    for element in document.select(&all) {
        let Some(attrs) = link_attributes_for(element.value().name()) else {
            continue;
        };

        for attr in attrs {
            let Some(value) = element.value().attr(attr) else {
                continue;
            };

            if *attr == "srcset" {
                references.extend(parse_srcset(value));
            } else {
                references.push(value);
            }
        }
    }

    references
}
