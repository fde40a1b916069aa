//! Configuration for the content service: a fluent builder and environment
//! settings.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{DEFAULT_TTL, FingerprintCache};
use crate::error::{ContentError, Result};
use crate::links::host_of;
use crate::lms::{HttpLmsClient, LmsClient};
use crate::sanitizer::SanitizerPipeline;
use crate::service::ContentService;

const DEFAULT_LMS_URL: &str = "https://moodle.example.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONCURRENCY: usize = 10;
const DEFAULT_USER_AGENT: &str = concat!("lms_content/", env!("CARGO_PKG_VERSION"));

/// Builder for configuring a [`ContentService`].
///
/// # Example
///
/// ```rust,no_run
/// use lms_content::ContentServiceBuilder;
/// use std::time::Duration;
///
/// # async fn example() -> lms_content::Result<()> {
/// let service = ContentServiceBuilder::new("https://lms.example.com")
///     .timeout(Duration::from_secs(15))
///     .concurrency(4)
///     .cache_ttl(Duration::from_secs(600))
///     .build()?;
///
/// let response = service
///     .fetch_and_sanitize("https://lms.example.com/mod/page/view.php?id=42", "token")
///     .await;
/// # Ok(())
/// # }
/// ```
pub struct ContentServiceBuilder {
    lms_url: String,
    timeout: Duration,
    user_agent: String,
    concurrency: usize,
    cache_ttl: Duration,
    cache: Option<Arc<FingerprintCache>>,
}

impl ContentServiceBuilder {
    /// Create a builder for the LMS at `lms_url` with defaults.
    ///
    /// Defaults: timeout 30 s, batch concurrency 10, cache TTL 1 h, a fresh
    /// cache.
    pub fn new(lms_url: impl Into<String>) -> Self {
        Self {
            lms_url: lms_url.into(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            cache_ttl: DEFAULT_TTL,
            cache: None,
        }
    }

    /// Per-request timeout of the HTTP transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Maximum number of pipeline runs a batch executes at once (at least 1).
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// TTL of a freshly created cache. Ignored when [`cache`](Self::cache) is set.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Use an existing cache instead of creating one.
    pub fn cache(mut self, cache: Arc<FingerprintCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Build a service talking to the LMS over HTTP.
    pub fn build(self) -> Result<ContentService<HttpLmsClient>> {
        if host_of(&self.lms_url).is_none() {
            return Err(ContentError::Config(format!(
                "invalid LMS URL: {}",
                self.lms_url
            )));
        }
        let client = HttpLmsClient::new(&self.lms_url, self.timeout, &self.user_agent)?;
        Ok(self.build_with_client(client))
    }

    /// Build a service around any [`LmsClient`].
    pub fn build_with_client<C: LmsClient>(self, client: C) -> ContentService<C> {
        let lms_host = host_of(&self.lms_url);
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(FingerprintCache::new(self.cache_ttl)));

        tracing::debug!(
            "Content service for {} (concurrency {}, ttl {:?})",
            self.lms_url,
            self.concurrency,
            cache.default_ttl()
        );

        ContentService::new(
            client,
            cache,
            SanitizerPipeline::for_lms(lms_host.as_deref()),
            self.concurrency,
        )
    }
}

/// Service settings read from the environment.
///
/// | Variable | Default |
/// |---|---|
/// | `MOODLE_URL` | `https://moodle.example.com` |
/// | `LMS_TIMEOUT_SECS` | `30` |
/// | `BATCH_CONCURRENCY` | `10` |
/// | `CACHE_TTL_SECS` | `3600` |
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub lms_url: String,
    pub timeout: Duration,
    pub concurrency: usize,
    pub cache_ttl: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            lms_url: DEFAULT_LMS_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
            cache_ttl: DEFAULT_TTL,
        }
    }
}

impl Settings {
    /// Read settings from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            lms_url: lookup("MOODLE_URL").unwrap_or(defaults.lms_url),
            timeout: match lookup("LMS_TIMEOUT_SECS") {
                Some(value) => Duration::from_secs(parse_number("LMS_TIMEOUT_SECS", &value)?),
                None => defaults.timeout,
            },
            concurrency: match lookup("BATCH_CONCURRENCY") {
                Some(value) => parse_number("BATCH_CONCURRENCY", &value)?,
                None => defaults.concurrency,
            },
            cache_ttl: match lookup("CACHE_TTL_SECS") {
                Some(value) => Duration::from_secs(parse_number("CACHE_TTL_SECS", &value)?),
                None => defaults.cache_ttl,
            },
        })
    }

    /// A builder preloaded with these settings.
    pub fn into_builder(self) -> ContentServiceBuilder {
        ContentServiceBuilder::new(self.lms_url)
            .timeout(self.timeout)
            .concurrency(self.concurrency)
            .cache_ttl(self.cache_ttl)
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ContentError::Config(format!("{name} must be a number, got {value:?}")))
}
