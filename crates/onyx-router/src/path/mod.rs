//! Request-path helpers shared by the manifest, the mask engine and the
//! dispatcher.
//!
//! Everything here is pure and allocation-free when the input is already in
//! canonical form.

use std::borrow::Cow;

pub mod hierarchy;
pub use hierarchy::Ancestors;

/// Returns true when `path` is already canonical.
///
/// Canonical means: starts with `/`, no `//`, no `\`, no trailing `/`
/// (except the root itself).
///
/// ```
/// use onyx_router::path::is_canonical;
///
/// assert!(is_canonical("/"));
/// assert!(is_canonical("/posts/5"));
/// assert!(!is_canonical("posts"));
/// assert!(!is_canonical("/posts/"));
/// assert!(!is_canonical("/posts//5"));
/// ```
pub fn is_canonical(path: &str) -> bool {
    if !path.starts_with('/') || path.contains("//") || path.contains('\\') {
        return false;
    }
    path == "/" || !path.ends_with('/')
}

/// Brings a request path into canonical form.
///
/// Backslashes become slashes, empty segments are dropped and the trailing
/// slash is removed. Borrowed when nothing needs to change.
///
/// ```
/// use onyx_router::path::normalize_path;
///
/// assert_eq!(normalize_path("/a/b"), "/a/b");
/// assert_eq!(normalize_path("a//b/"), "/a/b");
/// assert_eq!(normalize_path("\\a\\b"), "/a/b");
/// assert_eq!(normalize_path(""), "/");
/// ```
pub fn normalize_path(path: &str) -> Cow<'_, str> {
    if is_canonical(path) {
        return Cow::Borrowed(path);
    }

    let joined = path
        .replace('\\', "/")
        .split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    if joined.is_empty() {
        Cow::Borrowed("/")
    } else {
        Cow::Owned(format!("/{}", joined))
    }
}

/// Splits an href into its pathname and raw query string (without `?`).
/// Any `#fragment` is discarded.
///
/// ```
/// use onyx_router::path::split_href;
///
/// assert_eq!(split_href("/docs?page=2#top"), ("/docs", Some("page=2")));
/// assert_eq!(split_href("/docs#top"), ("/docs", None));
/// ```
pub fn split_href(href: &str) -> (&str, Option<&str>) {
    let without_hash = href.split_once('#').map_or(href, |(head, _)| head);
    match without_hash.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (without_hash, None),
    }
}

/// Number of non-empty segments in a path.
pub fn depth(path: &str) -> usize {
    path.split('/').filter(|s| !s.is_empty()).count()
}
