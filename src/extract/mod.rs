//! Content extraction from fetched HTML
//!
//! The extractor is a pure collaborator of the crawl engine: raw bytes in,
//! title + main content + outbound links + image references out. It never
//! touches engine state, so page workers can call it concurrently without
//! coordination.

use scraper::{Html, Selector};
use url::Url;

/// Selectors tried in order when looking for the main content container
const CONTENT_SELECTORS: &[&str] = &[
    "article[role=\"main\"]",
    "main[role=\"main\"]",
    "main",
    "article",
    ".markdown",
    ".content",
    ".main-content",
    ".doc-content",
    "#main-content",
    "body",
];

/// A content node shorter than this is assumed to be navigation chrome
const MIN_CONTENT_LEN: usize = 200;

/// Extraction result for one page
#[derive(Debug, Clone)]
pub struct Extracted {
    pub title: Option<String>,
    /// The selected main-content subtree, serialized back to HTML
    pub content_html: String,
    /// Absolute outbound links
    pub links: Vec<String>,
    /// Absolute image references
    pub image_refs: Vec<String>,
}

/// Extracts title, main content, links and image references from a page
///
/// Relative links and image sources are resolved against `base_url`.
/// `javascript:`, `mailto:` and `tel:` links and data URIs are dropped.
pub fn extract(html: &str, base_url: &Url) -> Extracted {
    let document = Html::parse_document(html);

    Extracted {
        title: extract_title(&document),
        content_html: extract_content(&document),
        links: extract_links(&document, base_url),
        image_refs: extract_images(&document, base_url),
    }
}

fn extract_title(document: &Html) -> Option<String> {
    for selector in ["title", "h1"] {
        let selector = Selector::parse(selector).ok()?;
        let found = document
            .select(&selector)
            .next()
            .map(|element| element.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty());
        if found.is_some() {
            return found;
        }
    }
    None
}

/// Picks the first substantial content container from the selector list
fn extract_content(document: &Html) -> String {
    for selector_str in CONTENT_SELECTORS {
        let selector = match Selector::parse(selector_str) {
            Ok(s) => s,
            Err(_) => continue,
        };

        for element in document.select(&selector) {
            let text: String = element.text().collect();
            if text.trim().len() >= MIN_CONTENT_LEN {
                return element.html();
            }
        }
    }

    // Thin page: fall back to whatever the body holds
    match Selector::parse("body") {
        Ok(selector) => document
            .select(&selector)
            .next()
            .map(|e| e.html())
            .unwrap_or_default(),
        Err(_) => String::new(),
    }
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let selector = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let mut links = Vec::new();
    for element in document.select(&selector) {
        let href = match element.value().attr("href") {
            Some(h) => h.trim(),
            None => continue,
        };

        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
            || href.starts_with("data:")
        {
            continue;
        }

        if let Ok(absolute) = base_url.join(href) {
            links.push(absolute.to_string());
        }
    }
    links
}

fn extract_images(document: &Html, base_url: &Url) -> Vec<String> {
    let selector = match Selector::parse("img[src]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let mut images = Vec::new();
    for element in document.select(&selector) {
        let src = match element.value().attr("src") {
            Some(s) => s.trim(),
            None => continue,
        };

        if src.is_empty() || src.starts_with("data:") {
            continue;
        }

        if let Ok(absolute) = base_url.join(src) {
            images.push(absolute.to_string());
        }
    }
    images
}
