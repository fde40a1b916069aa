use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lms_content::{
    ContentError, ContentService, ContentServiceBuilder, CourseModule, FingerprintCache,
    LmsClient, Module, ModuleContent, Section, Status, activity_key,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const LMS: &str = "https://lms.example.com";

fn activity(cmid: u64) -> String {
    format!("{LMS}/mod/page/view.php?id={cmid}")
}

fn file_url(name: &str) -> String {
    format!("{LMS}/pluginfile.php/1/mod_resource/content/{name}")
}

/// In-memory LMS with scripted modules, courses and downloads.
///
/// Records every lookup and download, and tracks how many module lookups run
/// at the same time.
#[derive(Default)]
struct MockLms {
    modules: HashMap<u64, u64>,
    courses: HashMap<u64, Vec<Section>>,
    downloads: HashMap<String, Option<String>>,
    failing_lookups: HashSet<u64>,
    delay: Duration,
    lookups: AtomicUsize,
    downloaded: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockLms {
    /// Register module `cmid` in `course` with the given `(filename, body)` files.
    fn page(mut self, cmid: u64, course: u64, files: &[(&str, Option<&str>)]) -> Self {
        let contents = files
            .iter()
            .map(|(name, _)| ModuleContent::file(*name, file_url(name)))
            .collect();
        for (name, body) in files {
            self.downloads
                .insert(file_url(name), body.map(str::to_string));
        }
        self.modules.insert(cmid, course);
        self.courses.entry(course).or_default().push(Section {
            id: cmid,
            name: format!("Section {cmid}"),
            modules: vec![Module {
                id: cmid,
                name: format!("Activity {cmid}"),
                modname: "resource".into(),
                contents,
            }],
        });
        self
    }

    /// Serve `body` when the activity URL itself is downloaded.
    fn direct(mut self, url: &str, body: Option<&str>) -> Self {
        self.downloads
            .insert(url.to_string(), body.map(str::to_string));
        self
    }

    fn failing_lookup(mut self, cmid: u64) -> Self {
        self.failing_lookups.insert(cmid);
        self
    }

    fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn downloaded(&self) -> Vec<String> {
        self.downloaded.lock().unwrap().clone()
    }
}

impl LmsClient for MockLms {
    async fn get_course_module(&self, _token: &str, cmid: u64) -> lms_content::Result<CourseModule> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_lookups.contains(&cmid) {
            return Err(ContentError::RemoteProtocol(
                "Invalid parameter value detected".into(),
            ));
        }
        Ok(self
            .modules
            .get(&cmid)
            .map(|course| CourseModule::in_course(cmid, *course))
            .unwrap_or_default())
    }

    async fn get_course_contents(
        &self,
        _token: &str,
        course_id: u64,
    ) -> lms_content::Result<Vec<Section>> {
        Ok(self.courses.get(&course_id).cloned().unwrap_or_default())
    }

    async fn download_file(&self, _token: &str, url: &str) -> lms_content::Result<Option<String>> {
        self.downloaded.lock().unwrap().push(url.to_string());
        match self.downloads.get(url) {
            Some(body) => Ok(body.clone()),
            None => Err(ContentError::Fetch(format!("404 Not Found: {url}"))),
        }
    }
}

fn service(lms: MockLms) -> ContentService<MockLms> {
    ContentServiceBuilder::new(LMS).build_with_client(lms)
}

// ---------------------------------------------------------------------------
// Single-item pipeline
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_joins_and_sanitizes_module_html_files() {
    let lms = MockLms::default().page(
        42,
        7,
        &[
            ("intro.html", Some("<nav>Menu</nav><h2>Week 1</h2><p>Intro</p>")),
            ("handout.pdf", Some("%PDF-1.4")),
            ("part2.HTM", Some("<h2>Week 1</h2><p>More</p><script>x()</script>")),
        ],
    );
    let service = service(lms);

    let response = service.fetch_and_sanitize(&activity(42), "T").await;

    assert!(response.success, "{:?}", response.error);
    assert_eq!(response.status, Status::Ok);
    assert!(!response.cached);
    assert_eq!(
        response.content.as_deref(),
        Some("<h2>Week 1</h2><p>Intro</p>\n\n<p>More</p>")
    );
    assert_eq!(
        service.client().downloaded(),
        vec![file_url("intro.html"), file_url("part2.HTM")]
    );
}

#[tokio::test]
async fn second_fetch_is_served_from_cache() {
    let lms = MockLms::default().page(42, 7, &[("index.html", Some("<p>Body</p>"))]);
    let service = service(lms);

    let first = service.fetch_and_sanitize(&activity(42), "T").await;
    let second = service.fetch_and_sanitize(&activity(42), "T").await;

    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(first.content, second.content);
    assert_eq!(service.client().lookups(), 1);
    assert_eq!(service.client().downloaded().len(), 1);
}

#[tokio::test]
async fn cache_key_does_not_depend_on_token() {
    let lms = MockLms::default().page(42, 7, &[("index.html", Some(r#"<img src="/a.png">"#))]);
    let service = service(lms);

    let first = service.fetch_and_sanitize(&activity(42), "OLD").await;
    let second = service.fetch_and_sanitize(&activity(42), "NEW").await;

    assert_eq!(first.content.as_deref(), Some(r#"<img src="/a.png?token=OLD">"#));
    assert!(second.cached);
    assert_eq!(second.content, first.content);
}

#[tokio::test]
async fn images_are_tokenized_with_request_token() {
    let lms = MockLms::default().page(
        42,
        7,
        &[(
            "index.html",
            Some(concat!(
                r#"<p><img src="/pluginfile.php/3/diagram.png?rev=2"></p>"#,
                r#"<img src="https://lms.example.com/pluginfile.php/3/photo.jpg">"#,
                r#"<img src="https://images.other.org/logo.png">"#,
            )),
        )],
    );
    let service = service(lms);

    let content = service
        .fetch_and_sanitize(&activity(42), "abc123")
        .await
        .content
        .unwrap();

    assert!(content.contains(r#"src="/pluginfile.php/3/diagram.png?rev=2&token=abc123""#));
    assert!(content.contains(r#"src="https://lms.example.com/pluginfile.php/3/photo.jpg?token=abc123""#));
    assert!(content.contains(r#"src="https://images.other.org/logo.png""#));
}

#[tokio::test]
async fn module_without_html_falls_back_to_direct_download() {
    let url = activity(42);
    let lms = MockLms::default()
        .page(42, 7, &[("slides.pdf", Some("%PDF"))])
        .direct(&url, Some("<div class=\"breadcrumb\">Home</div><p>Page body</p>"));
    let service = service(lms);

    let response = service.fetch_and_sanitize(&url, "T").await;

    assert!(response.success, "{:?}", response.error);
    assert_eq!(response.content.as_deref(), Some("<p>Page body</p>"));
    assert_eq!(service.client().downloaded(), vec![url]);
}

#[tokio::test]
async fn failed_fallback_is_recoverable_failure() {
    let url = activity(42);
    let lms = MockLms::default().page(42, 7, &[]).direct(&url, None);
    let service = service(lms);

    let response = service.fetch_and_sanitize(&url, "T").await;

    assert!(!response.success);
    assert_eq!(response.status, Status::Recoverable);
    assert_eq!(response.content, None);
    assert!(
        response
            .error
            .as_deref()
            .unwrap()
            .contains("no content found and direct download failed")
    );
    assert!(service.cache().is_empty(), "failures are never cached");
}

#[tokio::test]
async fn partial_file_failures_still_succeed() {
    let lms = MockLms::default().page(
        42,
        7,
        &[("a.html", None), ("b.html", Some("<p>B</p>"))],
    );
    let service = service(lms);

    let response = service.fetch_and_sanitize(&activity(42), "T").await;
    assert_eq!(response.content.as_deref(), Some("<p>B</p>"));
}

#[tokio::test]
async fn all_file_failures_do_not_fall_back() {
    let url = activity(42);
    let lms = MockLms::default()
        .page(42, 7, &[("a.html", None), ("b.html", None)])
        .direct(&url, Some("<p>should not be used</p>"));
    let service = service(lms);

    let response = service.fetch_and_sanitize(&url, "T").await;

    assert!(!response.success);
    assert_eq!(response.status, Status::Recoverable);
    assert!(!service.client().downloaded().contains(&url));
}

#[tokio::test]
async fn url_without_module_id_is_fatal_and_skips_lms() {
    let service = service(MockLms::default());

    let response = service
        .fetch_and_sanitize(&format!("{LMS}/course/view.php"), "T")
        .await;

    assert!(!response.success);
    assert_eq!(response.status, Status::Fatal);
    assert!(response.error.unwrap().starts_with("Invalid activity reference"));
    assert_eq!(service.client().lookups(), 0);
}

#[tokio::test]
async fn module_without_course_is_resolution_error() {
    let service = service(MockLms::default());

    let response = service.fetch_and_sanitize(&activity(99), "T").await;

    assert!(!response.success);
    assert_eq!(response.status, Status::Fatal);
    assert!(response.error.unwrap().starts_with("Resolution error"));
}

#[tokio::test]
async fn remote_lookup_errors_are_surfaced() {
    let service = service(MockLms::default().failing_lookup(42));

    let response = service.fetch_and_sanitize(&activity(42), "T").await;

    assert!(!response.success);
    assert_eq!(response.status, Status::Fatal);
    assert_eq!(
        response.error.as_deref(),
        Some("Remote protocol error: Invalid parameter value detected")
    );
}

// ---------------------------------------------------------------------------
// Cache control
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invalidate_forces_refetch() {
    let lms = MockLms::default().page(42, 7, &[("index.html", Some("<p>Body</p>"))]);
    let service = service(lms);
    let url = activity(42);

    service.fetch_and_sanitize(&url, "T").await;
    assert!(service.invalidate(&activity_key(&url)));
    assert!(!service.invalidate(&activity_key(&url)));

    let response = service.fetch_and_sanitize(&url, "T").await;
    assert!(!response.cached);
    assert_eq!(service.client().lookups(), 2);

    assert!(service.invalidate_url(&url));
}

#[tokio::test]
async fn clear_all_empties_cache() {
    let lms = MockLms::default()
        .page(1, 7, &[("a.html", Some("<p>A</p>"))])
        .page(2, 7, &[("b.html", Some("<p>B</p>"))]);
    let service = service(lms);

    service.fetch_and_sanitize(&activity(1), "T").await;
    service.fetch_and_sanitize(&activity(2), "T").await;
    assert_eq!(service.cache().len(), 2);

    service.clear_all();
    assert!(service.cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn expired_entries_are_refetched() {
    let lms = MockLms::default().page(42, 7, &[("index.html", Some("<p>Body</p>"))]);
    let service = ContentServiceBuilder::new(LMS)
        .cache_ttl(Duration::from_secs(60))
        .build_with_client(lms);
    let url = activity(42);

    service.fetch_and_sanitize(&url, "T").await;
    tokio::time::advance(Duration::from_secs(30)).await;
    assert!(service.fetch_and_sanitize(&url, "T").await.cached);

    tokio::time::advance(Duration::from_secs(31)).await;
    assert!(!service.fetch_and_sanitize(&url, "T").await.cached);
    assert_eq!(service.client().lookups(), 2);
}

#[tokio::test]
async fn services_can_share_a_cache() {
    let cache = Arc::new(FingerprintCache::default());
    let first = ContentServiceBuilder::new(LMS)
        .cache(Arc::clone(&cache))
        .build_with_client(MockLms::default().page(42, 7, &[("a.html", Some("<p>A</p>"))]));
    let second = ContentServiceBuilder::new(LMS)
        .cache(Arc::clone(&cache))
        .build_with_client(MockLms::default());

    first.fetch_and_sanitize(&activity(42), "T").await;
    let response = second.fetch_and_sanitize(&activity(42), "T").await;

    assert!(response.cached);
    assert_eq!(response.content.as_deref(), Some("<p>A</p>"));
    assert_eq!(second.client().lookups(), 0);
}

// ---------------------------------------------------------------------------
// Batch prefetch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn batch_preserves_order_and_isolates_failures() {
    let lms = MockLms::default()
        .failing_lookup(1)
        .page(2, 7, &[("b.html", Some("<p>B</p>"))])
        .page(3, 7, &[("c.html", Some("<p>C</p>"))]);
    let service = service(lms);
    let urls = vec![activity(1), activity(2), activity(3)];

    let batch = service.batch_prefetch(&urls, "T").await;

    assert!(batch.success);
    assert_eq!(batch.total, 3);
    assert_eq!(batch.loaded, 2);
    assert_eq!(batch.items.len(), 3);

    let item_urls: Vec<_> = batch.items.iter().map(|i| i.url.clone()).collect();
    assert_eq!(item_urls, urls);

    assert!(!batch.items[0].success);
    assert_eq!(batch.items[0].status, Status::Fatal);
    assert!(batch.items[0].error.is_some());
    assert!(batch.items[1].success);
    assert_eq!(batch.items[1].content.as_deref(), Some("<p>B</p>"));
    assert!(batch.items[2].success);
    assert_eq!(batch.items[2].content.as_deref(), Some("<p>C</p>"));
}

#[tokio::test]
async fn batch_order_survives_out_of_order_completion() {
    let mut lms = MockLms::default();
    for cmid in 1..=20 {
        let name = format!("p{cmid}.html");
        let body = format!("<p>{cmid}</p>");
        lms = lms.page(cmid, 7, &[(name.as_str(), Some(body.as_str()))]);
    }
    let service = service(lms.delay(Duration::from_millis(5)));
    let urls: Vec<String> = (1..=20).rev().map(activity).collect();

    let batch = service.batch_prefetch(&urls, "T").await;

    assert_eq!(batch.loaded, 20);
    for (item, cmid) in batch.items.iter().zip((1..=20u64).rev()) {
        assert_eq!(item.url, activity(cmid));
        assert_eq!(item.content.as_deref(), Some(format!("<p>{cmid}</p>").as_str()));
    }
}

#[tokio::test]
async fn batch_respects_concurrency_bound() {
    let mut lms = MockLms::default();
    for cmid in 1..=12 {
        let name = format!("p{cmid}.html");
        lms = lms.page(cmid, 7, &[(name.as_str(), Some("<p>x</p>"))]);
    }
    let service = ContentServiceBuilder::new(LMS)
        .concurrency(3)
        .build_with_client(lms.delay(Duration::from_millis(20)));
    let urls: Vec<String> = (1..=12).map(activity).collect();

    let batch = service.batch_prefetch(&urls, "T").await;

    assert_eq!(batch.loaded, 12);
    assert_eq!(service.client().max_in_flight.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn batch_with_explicit_concurrency() {
    let mut lms = MockLms::default();
    for cmid in 1..=4 {
        let name = format!("p{cmid}.html");
        lms = lms.page(cmid, 7, &[(name.as_str(), Some("<p>x</p>"))]);
    }
    let service = service(lms.delay(Duration::from_millis(10)));
    let urls: Vec<String> = (1..=4).map(activity).collect();

    let batch = service.batch_prefetch_with_concurrency(&urls, "T", 1).await;

    assert_eq!(batch.loaded, 4);
    assert_eq!(service.client().max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn batch_keeps_duplicate_urls() {
    let lms = MockLms::default().page(42, 7, &[("a.html", Some("<p>A</p>"))]);
    let service = service(lms);
    let urls = [activity(42), activity(42)];

    let batch = service.batch_prefetch(&urls, "T").await;

    assert_eq!(batch.total, 2);
    assert_eq!(batch.loaded, 2);
    assert_eq!(batch.items[0], batch.items[1]);
}

#[tokio::test]
async fn batch_fills_cache_for_single_fetches() {
    let lms = MockLms::default().page(42, 7, &[("a.html", Some("<p>A</p>"))]);
    let service = service(lms);

    service.batch_prefetch(&[activity(42)], "T").await;
    let response = service.fetch_and_sanitize(&activity(42), "T").await;

    assert!(response.cached);
    assert_eq!(service.client().lookups(), 1);
}

#[tokio::test]
async fn empty_batch() {
    let service = service(MockLms::default());
    let urls: Vec<String> = Vec::new();

    let batch = service.batch_prefetch(&urls, "T").await;

    assert!(batch.success);
    assert_eq!(batch.total, 0);
    assert_eq!(batch.loaded, 0);
    assert!(batch.items.is_empty());
}

// ---------------------------------------------------------------------------
// Sanitized output properties
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sanitized_content_is_stable_under_resanitizing() {
    let html = concat!(
        r#"<div class="no-overflow"><p>Sign in to Kortext to read</p></div>"#,
        r#"<h2>Topic</h2><p>&nbsp;</p><h2>Topic</h2>"#,
        r#"<p>Body&amp;nbsp;text</p><img src="/pix/spacer.gif">"#,
        r#"<p><img src="/pluginfile.php/5/fig.png" alt="Figure"></p>"#,
    );
    let lms = MockLms::default().page(42, 7, &[("index.html", Some(html))]);
    let service = service(lms);

    let once = service
        .fetch_and_sanitize(&activity(42), "T")
        .await
        .content
        .unwrap();

    let again = lms_content::SanitizerPipeline::for_lms(Some("lms.example.com"))
        .sanitize(&once, Some("T"));
    assert_eq!(once, again);
    assert_eq!(
        once,
        concat!(
            "<h2>Topic</h2><p>Body text</p>",
            r#"<p><img alt="Figure" src="/pluginfile.php/5/fig.png?token=T"></p>"#,
        )
    );
}
