//! Error types for the `lms_content` crate.

/// All errors that can occur while resolving, fetching, or sanitizing
/// activity content.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    /// The activity URL carries no extractable module id.
    #[error("Invalid activity reference: {0}")]
    InvalidReference(String),

    /// The module or its owning course could not be resolved.
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// No content could be downloaded for the activity.
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// The LMS answered with a malformed or error-shaped response.
    #[error("Remote protocol error: {0}")]
    RemoteProtocol(String),

    /// The HTTP transport failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The builder or environment configuration is invalid.
    #[error("Config error: {0}")]
    Config(String),
}

impl ContentError {
    /// Returns `true` if retrying the same request later may succeed.
    ///
    /// Nothing in this crate retries automatically; this only informs callers.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch(_) | Self::Http(_))
    }
}

/// A type alias for `Result<T, ContentError>`.
pub type Result<T> = std::result::Result<T, ContentError>;
