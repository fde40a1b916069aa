//! Literal-string-replacement sanitizer.

use super::Sanitizer;

/// Sanitizer that performs exact substring replacements on serialized HTML.
///
/// Rules are applied in order; each rule operates on the output of the
/// previous one.
///
/// # Example
///
/// ```
/// use lms_content::{Sanitizer, SubstringSanitizer};
///
/// let s = SubstringSanitizer::entity_fixups();
/// assert_eq!(s.sanitize("a&amp;nbsp;b&nbsp;c &amp;amp; d", None), "a b c & d");
/// ```
pub struct SubstringSanitizer {
    rules: Vec<(String, String)>,
}

impl SubstringSanitizer {
    /// Create a new `SubstringSanitizer` from `(needle, replacement)` pairs.
    pub fn new(rules: Vec<(&str, &str)>) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|(needle, replacement)| (needle.to_string(), replacement.to_string()))
                .collect(),
        }
    }

    /// Fixups for double-encoded entities that survive re-serialization.
    ///
    /// `&amp;nbsp;` must be replaced before `&nbsp;`.
    pub fn entity_fixups() -> Self {
        Self::new(vec![("&amp;nbsp;", " "), ("&nbsp;", " "), ("&amp;amp;", "&")])
    }
}

impl Sanitizer for SubstringSanitizer {
    fn sanitize(&self, html: &str, _token: Option<&str>) -> String {
        self.rules
            .iter()
            .fold(html.to_string(), |acc, (needle, replacement)| {
                acc.replace(needle, replacement)
            })
    }
}
