//! Result types returned to the HTTP layer.

use serde::Serialize;

use crate::error::ContentError;

/// Outcome class of a single pipeline run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    /// The request failed but may succeed if retried later.
    Recoverable,
    /// The request will keep failing until the reference or remote state changes.
    Fatal,
}

impl From<&ContentError> for Status {
    fn from(error: &ContentError) -> Self {
        if error.is_retryable() {
            Self::Recoverable
        } else {
            Self::Fatal
        }
    }
}

/// Result of [`ContentService::fetch_and_sanitize`](crate::ContentService::fetch_and_sanitize).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ContentResponse {
    pub success: bool,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ContentResponse {
    pub(crate) fn ok(content: String, cached: bool) -> Self {
        Self {
            success: true,
            status: Status::Ok,
            content: Some(content),
            cached,
            error: None,
        }
    }

    pub(crate) fn failure(error: &ContentError) -> Self {
        Self {
            success: false,
            status: error.into(),
            content: None,
            cached: false,
            error: Some(error.to_string()),
        }
    }
}

/// One entry of a batch prefetch, always present for every submitted URL.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchItem {
    pub url: String,
    pub success: bool,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchItem {
    pub(crate) fn ok(url: &str, content: String) -> Self {
        Self {
            url: url.to_string(),
            success: true,
            status: Status::Ok,
            content: Some(content),
            error: None,
        }
    }

    pub(crate) fn failure(url: &str, error: &ContentError) -> Self {
        Self {
            url: url.to_string(),
            success: false,
            status: error.into(),
            content: None,
            error: Some(error.to_string()),
        }
    }
}

/// Result of [`ContentService::batch_prefetch`](crate::ContentService::batch_prefetch).
///
/// `items` is in submission order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchResponse {
    pub success: bool,
    pub total: usize,
    pub loaded: usize,
    pub items: Vec<BatchItem>,
}

impl BatchResponse {
    pub(crate) fn from_items(items: Vec<BatchItem>) -> Self {
        let loaded = items.iter().filter(|item| item.success).count();
        Self {
            success: true,
            total: items.len(),
            loaded,
            items,
        }
    }
}
