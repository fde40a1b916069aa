//! HTML sanitizer pipeline that makes LMS activity content safe to display.
//!
//! Sanitizers implement the [`Sanitizer`] trait and are composed into a
//! [`SanitizerPipeline`] that runs them sequentially.
//!
//! Built-in sanitizers:
//!
//! - [`DomCleaner`] -- DOM passes that strip chrome, vendor widgets,
//!   duplicates and decorative markup, and tokenize image URLs.
//! - [`SubstringSanitizer`] -- literal string replacements, used for the
//!   final entity fixups.

mod dom;
mod rules;
mod serialize;
mod substring;

pub use dom::DomCleaner;
pub use substring::SubstringSanitizer;

/// Trait for HTML content sanitizers.
///
/// Each sanitizer receives an HTML string and the access token used for URL
/// rewriting, and returns a transformed version. For a given input and token
/// the output must always be the same.
pub trait Sanitizer: Send + Sync {
    /// Transform the given HTML content, returning the sanitized result.
    fn sanitize(&self, html: &str, token: Option<&str>) -> String;
}

/// An ordered chain of [`Sanitizer`] implementations applied sequentially.
///
/// Each sanitizer receives the output of the previous one. An empty pipeline
/// is a no-op.
pub struct SanitizerPipeline {
    sanitizers: Vec<Box<dyn Sanitizer>>,
}

impl SanitizerPipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self {
            sanitizers: Vec::new(),
        }
    }

    /// The standard LMS cleanup: [`DomCleaner`] followed by
    /// [`SubstringSanitizer::entity_fixups`].
    ///
    /// Entity fixups run on the serialized string because they repair
    /// double-encoding that only appears after serialization.
    pub fn for_lms(lms_host: Option<&str>) -> Self {
        let mut pipeline = Self::new();
        pipeline.add(DomCleaner::new(lms_host));
        pipeline.add(SubstringSanitizer::entity_fixups());
        pipeline
    }

    /// Append a sanitizer to the end of the pipeline.
    pub fn add(&mut self, sanitizer: impl Sanitizer + 'static) {
        self.sanitizers.push(Box::new(sanitizer));
    }

    /// Run the full pipeline on the given HTML, returning the final result.
    pub fn sanitize(&self, html: &str, token: Option<&str>) -> String {
        if html.is_empty() {
            return String::new();
        }

        let output = self
            .sanitizers
            .iter()
            .fold(html.to_string(), |acc, s| s.sanitize(&acc, token));
        tracing::debug!("Cleaned HTML: {} -> {} bytes", html.len(), output.len());
        output
    }

    /// Returns `true` if no sanitizers have been added.
    pub fn is_empty(&self) -> bool {
        self.sanitizers.is_empty()
    }
}

impl Default for SanitizerPipeline {
    fn default() -> Self {
        Self::new()
    }
}
