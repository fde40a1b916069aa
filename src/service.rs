//! The content pipeline: cache lookup, then resolve, fetch, sanitize and
//! write through to the cache.

use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::cache::{FingerprintCache, activity_key};
use crate::error::Result;
use crate::fetcher::fetch_raw;
use crate::lms::{HttpLmsClient, LmsClient};
use crate::resolver::resolve_files;
use crate::response::{BatchItem, BatchResponse, ContentResponse};
use crate::sanitizer::SanitizerPipeline;

/// Fetches, sanitizes and caches LMS activity content.
///
/// Built with [`ContentServiceBuilder`](crate::ContentServiceBuilder). The
/// cache is an explicit, shareable instance; several services may use the
/// same one.
///
/// Cache keys ignore the token. Image URLs in cached content carry the token
/// of the request that filled the entry, and every later caller receives that
/// same token, whoever they are. Callers serving several users should strip
/// or re-tokenize `token=` parameters before returning content.
pub struct ContentService<C: LmsClient = HttpLmsClient> {
    client: C,
    cache: Arc<FingerprintCache>,
    sanitizer: SanitizerPipeline,
    concurrency: usize,
}

impl<C: LmsClient> ContentService<C> {
    pub(crate) fn new(
        client: C,
        cache: Arc<FingerprintCache>,
        sanitizer: SanitizerPipeline,
        concurrency: usize,
    ) -> Self {
        Self {
            client,
            cache,
            sanitizer,
            concurrency: concurrency.max(1),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn cache(&self) -> &Arc<FingerprintCache> {
        &self.cache
    }

    /// Default number of pipeline runs a batch executes at once.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Return sanitized content for one activity URL, from cache if present.
    ///
    /// Failures are reported in the response, never as a panic or stale
    /// content.
    pub async fn fetch_and_sanitize(&self, url: &str, token: &str) -> ContentResponse {
        match self.load(url, token).await {
            Ok((content, cached)) => ContentResponse::ok(content, cached),
            Err(e) => {
                tracing::error!("Error fetching content for {url}: {e}");
                ContentResponse::failure(&e)
            }
        }
    }

    /// Prefetch many URLs with the configured concurrency bound.
    pub async fn batch_prefetch<U>(&self, urls: &[U], token: &str) -> BatchResponse
    where
        U: AsRef<str> + Sync,
    {
        self.batch_prefetch_with_concurrency(urls, token, self.concurrency)
            .await
    }

    /// Prefetch many URLs, running at most `concurrency` pipelines at once.
    ///
    /// Every URL yields exactly one item, in submission order. Work beyond the
    /// bound waits for a free slot.
    pub async fn batch_prefetch_with_concurrency<U>(
        &self,
        urls: &[U],
        token: &str,
        concurrency: usize,
    ) -> BatchResponse
    where
        U: AsRef<str> + Sync,
    {
        let mut indexed: Vec<(usize, BatchItem)> = stream::iter(urls.iter().enumerate())
            .map(|(index, url)| async move {
                let url = url.as_ref();
                let item = match self.load(url, token).await {
                    Ok((content, _)) => BatchItem::ok(url, content),
                    Err(e) => {
                        tracing::error!("Batch item {url} failed: {e}");
                        BatchItem::failure(url, &e)
                    }
                };
                (index, item)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        indexed.sort_by_key(|(index, _)| *index);
        let response =
            BatchResponse::from_items(indexed.into_iter().map(|(_, item)| item).collect());
        tracing::info!(
            "Batch prefetch loaded {}/{} activities",
            response.loaded,
            response.total
        );
        response
    }

    /// Remove one cache entry by key (`activity:<fingerprint>`).
    pub fn invalidate(&self, key: &str) -> bool {
        self.cache.remove(key)
    }

    /// Remove the cache entry for an activity URL.
    pub fn invalidate_url(&self, url: &str) -> bool {
        self.invalidate(&activity_key(url))
    }

    /// Remove every cached entry.
    pub fn clear_all(&self) {
        self.cache.clear();
        tracing::info!("Content cache cleared");
    }

    async fn load(&self, url: &str, token: &str) -> Result<(String, bool)> {
        let key = activity_key(url);
        if let Some(content) = self.cache.get(&key) {
            tracing::debug!("Cache hit for {url}");
            return Ok((content, true));
        }

        let content = self.run_pipeline(url, token).await?;
        self.cache.insert(key, content.clone());
        Ok((content, false))
    }

    async fn run_pipeline(&self, url: &str, token: &str) -> Result<String> {
        let files = resolve_files(&self.client, token, url).await?;
        let raw = fetch_raw(&self.client, token, url, &files).await?;
        Ok(self.sanitizer.sanitize(&raw, Some(token)))
    }
}
