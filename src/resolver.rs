//! Resolves an activity URL to the HTML files that make up its content.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ContentError, Result};
use crate::lms::{LmsClient, Section};

static MODULE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]id=(\d+)").expect("invalid module id pattern"));

/// A downloadable content file belonging to a module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteFile {
    pub url: String,
    pub filename: String,
}

/// Extract the module id from the `id=<digits>` query parameter of an
/// activity URL.
///
/// # Example
///
/// ```
/// use lms_content::resolver::extract_module_id;
///
/// let id = extract_module_id("https://lms.example.com/mod/page/view.php?id=42").unwrap();
/// assert_eq!(id, 42);
/// assert!(extract_module_id("https://lms.example.com/course/view.php").is_err());
/// ```
pub fn extract_module_id(url: &str) -> Result<u64> {
    MODULE_ID
        .captures(url)
        .and_then(|caps| caps[1].parse::<u64>().ok())
        .filter(|id| *id != 0)
        .ok_or_else(|| {
            ContentError::InvalidReference(format!("could not extract module ID from {url}"))
        })
}

/// Resolve the activity URL to its ordered HTML content files.
///
/// An empty result is not an error: it means the module has no structured
/// HTML files and the caller should fall back to downloading the URL itself.
pub async fn resolve_files<C: LmsClient>(
    client: &C,
    token: &str,
    url: &str,
) -> Result<Vec<RemoteFile>> {
    let cmid = extract_module_id(url)?;

    let module = client.get_course_module(token, cmid).await?;
    let course_id = module.course_id().ok_or_else(|| {
        ContentError::Resolution(format!("could not extract course ID for module {cmid}"))
    })?;

    let sections = client.get_course_contents(token, course_id).await?;
    let files = html_files(&sections, cmid);
    tracing::debug!(
        "Module {cmid} in course {course_id} has {} HTML files",
        files.len()
    );
    Ok(files)
}

/// HTML files of the first module with id `cmid`, in the order the LMS lists
/// them.
fn html_files(sections: &[Section], cmid: u64) -> Vec<RemoteFile> {
    let Some(module) = sections
        .iter()
        .flat_map(|section| section.modules.iter())
        .find(|module| module.id == cmid)
    else {
        return Vec::new();
    };

    module
        .contents
        .iter()
        .filter(|content| is_html_file(&content.filename))
        .filter_map(|content| {
            content.fileurl.as_ref().map(|url| RemoteFile {
                url: url.clone(),
                filename: content.filename.clone(),
            })
        })
        .collect()
}

fn is_html_file(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    lower.ends_with(".html") || lower.ends_with(".htm")
}
