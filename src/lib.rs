//! # lms_content
//!
//! Fetches learning-activity pages from an LMS web-service API, sanitizes the
//! markup for display in a client app, and caches the result.
//!
//! ## Overview
//!
//! A [`ContentService`] runs a fixed pipeline for each activity URL:
//!
//! 1. look the URL up in a [`FingerprintCache`] (`activity:<sha256(url)>`);
//! 2. on a miss, resolve the URL's module id to its HTML files through an
//!    [`LmsClient`];
//! 3. download and concatenate those files, or download the URL itself when
//!    the module has none;
//! 4. run the [`SanitizerPipeline`] and write the result to the cache.
//!
//! [`ContentService::batch_prefetch`] runs the pipeline over many URLs with a
//! concurrency bound, isolating failures per URL.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use lms_content::Settings;
//!
//! # async fn example() -> lms_content::Result<()> {
//! let service = Settings::from_env()?.into_builder().build()?;
//!
//! let page = service
//!     .fetch_and_sanitize("https://lms.example.com/mod/page/view.php?id=42", "token")
//!     .await;
//! if let Some(html) = page.content {
//!     println!("{html}");
//! }
//!
//! let urls = ["https://lms.example.com/mod/page/view.php?id=43"];
//! let batch = service.batch_prefetch(&urls, "token").await;
//! println!("{}/{} loaded", batch.loaded, batch.total);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `rustls-tls` | **yes** | Use `rustls` for HTTPS requests to the LMS. |
//! | `native-tls` | no | Use the platform TLS stack instead. |

pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod links;
pub mod lms;
pub mod resolver;
pub mod response;
pub mod sanitizer;
mod service;

pub use cache::{FingerprintCache, activity_key, fingerprint};
pub use config::{ContentServiceBuilder, Settings};
pub use error::{ContentError, Result};
pub use lms::{CourseModule, HttpLmsClient, LmsClient, Module, ModuleContent, ModuleInfo, Section};
pub use resolver::{RemoteFile, extract_module_id};
pub use response::{BatchItem, BatchResponse, ContentResponse, Status};
pub use sanitizer::{DomCleaner, Sanitizer, SanitizerPipeline, SubstringSanitizer};
pub use service::ContentService;
