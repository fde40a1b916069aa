//! RPC-over-HTTP client for the LMS web-service endpoint.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ContentError, Result};
use crate::links::with_token;
use crate::lms::{CourseModule, LmsClient, Section};

const WEBSERVICE_PATH: &str = "/webservice/rest/server.php";

/// [`LmsClient`] backed by the LMS REST web-service (`server.php`) and plain
/// file downloads, using `reqwest`.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use lms_content::HttpLmsClient;
///
/// let client = HttpLmsClient::new(
///     "https://lms.example.com",
///     Duration::from_secs(30),
///     "lms-content/0.1",
/// ).unwrap();
/// ```
#[derive(Clone, Debug)]
pub struct HttpLmsClient {
    client: reqwest::Client,
    webservice_url: String,
}

impl HttpLmsClient {
    /// Create a client for the LMS at `base_url` with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Wrap an existing `reqwest` client.
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            webservice_url: format!("{}{WEBSERVICE_PATH}", base_url.trim_end_matches('/')),
        }
    }

    /// Invoke a web-service function and decode its JSON result.
    pub async fn call<T: DeserializeOwned>(
        &self,
        token: &str,
        wsfunction: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let mut form: Vec<(&str, String)> = vec![
            ("wstoken", token.to_string()),
            ("wsfunction", wsfunction.to_string()),
            ("moodlewsrestformat", "json".to_string()),
        ];
        form.extend(params.iter().cloned());

        tracing::debug!("LMS call: {wsfunction}");

        let body = self
            .client
            .post(&self.webservice_url)
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        decode_response(wsfunction, &body)
    }
}

impl LmsClient for HttpLmsClient {
    async fn get_course_module(&self, token: &str, cmid: u64) -> Result<CourseModule> {
        self.call(
            token,
            "core_course_get_course_module",
            &[("cmid", cmid.to_string())],
        )
        .await
    }

    async fn get_course_contents(&self, token: &str, course_id: u64) -> Result<Vec<Section>> {
        self.call(
            token,
            "core_course_get_contents",
            &[("courseid", course_id.to_string())],
        )
        .await
    }

    async fn download_file(&self, token: &str, url: &str) -> Result<Option<String>> {
        let body = self
            .client
            .get(with_token(url, token))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(classify_download(body))
    }
}

/// Decode a web-service response, surfacing `exception` objects as
/// [`ContentError::RemoteProtocol`].
fn decode_response<T: DeserializeOwned>(wsfunction: &str, body: &str) -> Result<T> {
    let value: Value = serde_json::from_str(body).map_err(|e| {
        ContentError::RemoteProtocol(format!("invalid JSON from {wsfunction}: {e}"))
    })?;

    if let Some(object) = value.as_object() {
        if object.contains_key("exception") {
            let message = object
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown LMS error");
            return Err(ContentError::RemoteProtocol(message.to_string()));
        }
    }

    serde_json::from_value(value).map_err(|e| {
        ContentError::RemoteProtocol(format!("unexpected response from {wsfunction}: {e}"))
    })
}

/// The LMS answers some failed downloads with a success status and a JSON
/// error object. Those, and empty bodies, count as "no content".
fn classify_download(body: String) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.starts_with('{') {
        if let Ok(object) = serde_json::from_str::<serde_json::Map<String, Value>>(trimmed) {
            if object.contains_key("error") || object.contains_key("exception") {
                tracing::error!("File download returned an error body: {trimmed}");
                return None;
            }
        }
    }

    Some(body)
}
