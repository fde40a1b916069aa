//! Downloads and concatenates the raw HTML of an activity.

use crate::error::{ContentError, Result};
use crate::lms::LmsClient;
use crate::resolver::RemoteFile;

const SEPARATOR: &str = "\n\n";

/// Download the resolved files in order and join their bodies with a blank
/// line.
///
/// Individual download failures are logged and skipped. When `files` is empty
/// the activity URL itself is downloaded instead.
pub async fn fetch_raw<C: LmsClient>(
    client: &C,
    token: &str,
    url: &str,
    files: &[RemoteFile],
) -> Result<String> {
    if files.is_empty() {
        return fetch_direct(client, token, url).await;
    }

    let mut bodies = Vec::with_capacity(files.len());
    for file in files {
        match client.download_file(token, &file.url).await {
            Ok(Some(body)) => bodies.push(body),
            Ok(None) => tracing::warn!("Failed to download {}: no content", file.filename),
            Err(e) => tracing::warn!("Failed to download {}: {e}", file.filename),
        }
    }

    if bodies.is_empty() {
        return Err(ContentError::Fetch(
            "failed to download any HTML content files".to_string(),
        ));
    }

    Ok(bodies.join(SEPARATOR))
}

async fn fetch_direct<C: LmsClient>(client: &C, token: &str, url: &str) -> Result<String> {
    tracing::info!("No HTML files for {url}, trying direct download");

    match client.download_file(token, url).await {
        Ok(Some(body)) => Ok(body),
        Ok(None) => Err(no_content()),
        Err(e) => {
            tracing::warn!("Direct download of {url} failed: {e}");
            Err(no_content())
        }
    }
}

fn no_content() -> ContentError {
    ContentError::Fetch("no content found and direct download failed".to_string())
}
