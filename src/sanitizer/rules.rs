//! Fixed rule tables for LMS content cleanup.

use std::sync::LazyLock;

use scraper::Selector;

/// Elements that never belong in client-rendered content: active content,
/// embedded frames, and LMS page chrome.
pub(crate) const UNWANTED_SELECTORS: &[&str] = &[
    "script",
    "style",
    "link[rel='stylesheet']",
    "iframe",
    "nav",
    ".navigation",
    ".breadcrumb",
    "#page-header",
    ".modified",
    ".activity-navigation",
];

/// Box-like containers that are dropped whole when they hold a vendor phrase.
pub(crate) const CONTAINER_CLASSES: &[&str] = &["no-overflow", "box", "generalbox", "prescribed-reading"];

/// E-book vendor widget markers.
pub(crate) const VENDOR_PHRASES: &[&str] = &[
    "Sign in to Kortext",
    "Open book in new window",
    "You will only be able to access the book on Kortext",
    "kortext.com",
    "launchReader",
    "emailKortextSupport",
];

pub(crate) const PRESCRIBED_READING_PHRASES: &[&str] = &["Prescribed Reading"];

/// Children that make an otherwise blank paragraph worth keeping.
pub(crate) const MEDIA_SELECTOR: &str = "img, video, audio, iframe";

fn parse(selector: &str) -> Selector {
    Selector::parse(selector).expect("invalid built-in selector")
}

pub(crate) static UNWANTED: LazyLock<Selector> =
    LazyLock::new(|| parse(&UNWANTED_SELECTORS.join(", ")));

pub(crate) static CONTAINERS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    CONTAINER_CLASSES
        .iter()
        .map(|class| parse(&format!(".{class}")))
        .collect()
});

/// Vendor and prescribed-reading phrases, lowercased for matching.
pub(crate) static LOCK_PHRASES: LazyLock<Vec<String>> = LazyLock::new(|| {
    VENDOR_PHRASES
        .iter()
        .chain(PRESCRIBED_READING_PHRASES)
        .map(|phrase| phrase.to_lowercase())
        .collect()
});

/// Headings subject to deduplication, in the order they are scanned.
pub(crate) static HEADINGS: LazyLock<Vec<(&'static str, Selector)>> =
    LazyLock::new(|| ["h2", "h3"].into_iter().map(|tag| (tag, parse(tag))).collect());

pub(crate) static IMAGES: LazyLock<Selector> = LazyLock::new(|| parse("img"));

pub(crate) static PARAGRAPHS: LazyLock<Selector> = LazyLock::new(|| parse("p"));

pub(crate) static MEDIA: LazyLock<Selector> = LazyLock::new(|| parse(MEDIA_SELECTOR));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_selectors_parse() {
        LazyLock::force(&UNWANTED);
        LazyLock::force(&CONTAINERS);
        LazyLock::force(&HEADINGS);
        LazyLock::force(&IMAGES);
        LazyLock::force(&PARAGRAPHS);
        LazyLock::force(&MEDIA);
        assert_eq!(CONTAINERS.len(), CONTAINER_CLASSES.len());
    }

    #[test]
    fn lock_phrases_are_lowercase() {
        assert!(LOCK_PHRASES.contains(&"prescribed reading".to_string()));
        assert!(LOCK_PHRASES.iter().all(|p| *p == p.to_lowercase()));
    }
}
