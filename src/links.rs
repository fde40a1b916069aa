//! URL helpers shared by the fetcher and the image rewriting pass.

use url::Url;

/// Returns `true` if the URL already carries an access token
/// (`token=` or `wstoken=`).
pub fn has_token(url: &str) -> bool {
    url.contains("token=")
}

/// Append `token=<token>` to the URL, using `&` if it already has a query
/// string and `?` otherwise.
///
/// # Example
///
/// ```
/// use lms_content::links::append_token;
///
/// assert_eq!(append_token("/file.png", "T"), "/file.png?token=T");
/// assert_eq!(append_token("/file.png?x=1", "T"), "/file.png?x=1&token=T");
/// ```
pub fn append_token(url: &str, token: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}token={token}")
}

/// Append the token unless the URL already carries one.
pub fn with_token(url: &str, token: &str) -> String {
    if has_token(url) {
        url.to_string()
    } else {
        append_token(url, token)
    }
}

/// Lowercased host of an absolute URL.
pub fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed.host_str().map(str::to_lowercase)
}

/// Returns `true` if `src` is an absolute URL whose host differs from
/// `lms_host`. Relative URLs are never foreign.
///
/// Absolute URLs that fail to parse are treated as foreign so they are left
/// untouched.
pub fn is_foreign(src: &str, lms_host: Option<&str>) -> bool {
    let absolute = if src.starts_with("//") {
        format!("https:{src}")
    } else if has_scheme(src, "http://") || has_scheme(src, "https://") {
        src.to_string()
    } else {
        return false;
    };

    match (host_of(&absolute), lms_host) {
        (Some(host), Some(lms)) => !host.eq_ignore_ascii_case(lms),
        _ => true,
    }
}

fn has_scheme(src: &str, scheme: &str) -> bool {
    src.get(..scheme.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(scheme))
}
