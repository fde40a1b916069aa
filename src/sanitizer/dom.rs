//! DOM cleanup passes for LMS activity content.

use std::collections::HashSet;

use scraper::Html;

use super::Sanitizer;
use super::rules::{CONTAINERS, HEADINGS, IMAGES, LOCK_PHRASES, MEDIA, PARAGRAPHS, UNWANTED};
use super::serialize::{Edits, serialize_fragment, serialize_outer, text_content};
use crate::links::{append_token, has_token, is_foreign};

/// Sanitizer that removes LMS chrome and vendor widgets and fixes image URLs.
///
/// The fragment is parsed once. Passes run in a fixed order and each sees the
/// removals made by the ones before it:
///
/// 1. unwanted elements (scripts, styles, frames, navigation chrome)
/// 2. box-like containers holding e-book vendor or prescribed-reading phrases
/// 3. repeated `h2`/`h3` headings
/// 4. decorative images (empty `src`, base64 GIFs, spacers)
/// 5. paragraphs with no text and no media
/// 6. token appended to LMS-hosted image URLs (only when a token is given)
///
/// # Example
///
/// ```
/// use lms_content::{DomCleaner, Sanitizer};
///
/// let cleaner = DomCleaner::new(Some("lms.example.com"));
/// let html = r#"<nav>Home</nav><h2>A</h2><p> </p><img src="/file.png">"#;
/// let result = cleaner.sanitize(html, Some("T"));
/// assert_eq!(result, r#"<h2>A</h2><img src="/file.png?token=T">"#);
/// ```
pub struct DomCleaner {
    lms_host: Option<String>,
}

impl DomCleaner {
    /// Create a cleaner. `lms_host` identifies absolute image URLs that
    /// belong to the LMS and therefore need the token.
    pub fn new(lms_host: Option<&str>) -> Self {
        Self {
            lms_host: lms_host.map(str::to_lowercase),
        }
    }
}

impl Sanitizer for DomCleaner {
    fn sanitize(&self, html: &str, token: Option<&str>) -> String {
        let document = Html::parse_fragment(html);
        let mut edits = Edits::default();

        strip_unwanted(&document, &mut edits);
        strip_vendor_containers(&document, &mut edits);
        dedup_headings(&document, &mut edits);
        strip_decorative_images(&document, &mut edits);
        strip_empty_paragraphs(&document, &mut edits);
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            rewrite_image_urls(&document, token, self.lms_host.as_deref(), &mut edits);
        }

        serialize_fragment(&document, &edits)
    }
}

fn strip_unwanted(document: &Html, edits: &mut Edits) {
    for element in document.select(&UNWANTED) {
        edits.remove(element.id());
    }
}

fn strip_vendor_containers(document: &Html, edits: &mut Edits) {
    for selector in CONTAINERS.iter() {
        for element in document.select(selector) {
            if edits.is_removed(*element) {
                continue;
            }
            let outer = serialize_outer(*element, edits).to_lowercase();
            if LOCK_PHRASES.iter().any(|phrase| outer.contains(phrase.as_str())) {
                tracing::debug!(
                    "Removed container <{}> with vendor content",
                    element.value().name()
                );
                edits.remove(element.id());
            }
        }
    }
}

fn dedup_headings(document: &Html, edits: &mut Edits) {
    let mut seen: HashSet<(&str, String)> = HashSet::new();

    for (tag, selector) in HEADINGS.iter() {
        for element in document.select(selector) {
            if edits.is_removed(*element) {
                continue;
            }
            let text = text_content(*element, edits);
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            if !seen.insert((*tag, text.to_string())) {
                tracing::debug!("Removed duplicate heading: {text}");
                edits.remove(element.id());
            }
        }
    }
}

fn is_decorative(src: &str) -> bool {
    src.is_empty() || src.starts_with("data:image/gif;base64") || src.contains("spacer")
}

fn strip_decorative_images(document: &Html, edits: &mut Edits) {
    for element in document.select(&IMAGES) {
        if edits.is_removed(*element) {
            continue;
        }
        if is_decorative(element.value().attr("src").unwrap_or_default()) {
            edits.remove(element.id());
        }
    }
}

fn strip_empty_paragraphs(document: &Html, edits: &mut Edits) {
    for element in document.select(&PARAGRAPHS) {
        if edits.is_removed(*element) {
            continue;
        }
        if !text_content(*element, edits).trim().is_empty() {
            continue;
        }
        let has_media = element
            .select(&MEDIA)
            .any(|media| !edits.is_removed(*media));
        if !has_media {
            edits.remove(element.id());
        }
    }
}

fn rewrite_image_urls(document: &Html, token: &str, lms_host: Option<&str>, edits: &mut Edits) {
    for element in document.select(&IMAGES) {
        if edits.is_removed(*element) {
            continue;
        }
        let Some(src) = element.value().attr("src") else {
            continue;
        };
        if has_token(src) || src.starts_with("data:") || is_foreign(src, lms_host) {
            continue;
        }
        edits.set_attr(element.id(), "src", append_token(src, token));
    }
}
