//! The LMS collaborator seen by the content pipeline.
//!
//! The pipeline only needs three remote operations: look up a module's owning
//! course, list a course's sections and modules, and download a file. They are
//! expressed by the [`LmsClient`] trait so the pipeline can run against the
//! bundled [`HttpLmsClient`] or any other implementation (tests use an
//! in-memory one).

mod http;

pub use http::HttpLmsClient;

use std::future::Future;

use serde::Deserialize;

use crate::error::Result;

/// Result of a module lookup (`core_course_get_course_module`).
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct CourseModule {
    #[serde(default)]
    pub cm: Option<ModuleInfo>,
}

impl CourseModule {
    /// Convenience constructor for a module owned by `course`.
    pub fn in_course(id: u64, course: u64) -> Self {
        Self {
            cm: Some(ModuleInfo {
                id,
                course: Some(course),
                ..ModuleInfo::default()
            }),
        }
    }

    /// The owning course id, if the lookup reported a non-zero one.
    pub fn course_id(&self) -> Option<u64> {
        self.cm.as_ref()?.course.filter(|id| *id != 0)
    }
}

/// Module metadata carried by a [`CourseModule`] lookup.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ModuleInfo {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub course: Option<u64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub modname: String,
}

/// One section of a course (`core_course_get_contents`).
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Section {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub modules: Vec<Module>,
}

/// A module listed inside a [`Section`].
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Module {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub modname: String,
    #[serde(default)]
    pub contents: Vec<ModuleContent>,
}

/// A file entry attached to a [`Module`].
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ModuleContent {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub fileurl: Option<String>,
}

impl ModuleContent {
    /// Convenience constructor for a file entry.
    pub fn file(filename: impl Into<String>, fileurl: impl Into<String>) -> Self {
        Self {
            kind: "file".to_string(),
            filename: filename.into(),
            fileurl: Some(fileurl.into()),
        }
    }
}

/// Remote operations the content pipeline depends on.
///
/// Implementations must be `Send + Sync` because the batch orchestrator drives
/// many pipeline runs concurrently against one client.
///
/// # Implementing a custom client
///
/// ```rust,no_run
/// use lms_content::{CourseModule, LmsClient, Result, Section};
///
/// struct Offline;
///
/// impl LmsClient for Offline {
///     async fn get_course_module(&self, _token: &str, cmid: u64) -> Result<CourseModule> {
///         Ok(CourseModule::in_course(cmid, 1))
///     }
///
///     async fn get_course_contents(&self, _token: &str, _course_id: u64) -> Result<Vec<Section>> {
///         Ok(Vec::new())
///     }
///
///     async fn download_file(&self, _token: &str, _url: &str) -> Result<Option<String>> {
///         Ok(None)
///     }
/// }
/// ```
pub trait LmsClient: Send + Sync + 'static {
    /// Look up a module by id to learn its owning course.
    fn get_course_module(
        &self,
        token: &str,
        cmid: u64,
    ) -> impl Future<Output = Result<CourseModule>> + Send;

    /// List a course's sections, each with its modules, in remote order.
    fn get_course_contents(
        &self,
        token: &str,
        course_id: u64,
    ) -> impl Future<Output = Result<Vec<Section>>> + Send;

    /// Download a file body.
    ///
    /// Transport failures and non-success statuses are errors. An empty body
    /// or an error-shaped JSON body is reported as `Ok(None)`.
    fn download_file(
        &self,
        token: &str,
        url: &str,
    ) -> impl Future<Output = Result<Option<String>>> + Send;
}
