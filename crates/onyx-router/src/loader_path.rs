//! Loader URL codec.
//!
//! A client navigation fetches route data from a flat asset URL:
//!
//! ```text
//! /assets/<cleaned>[_refetch_<n>_]_<cacheKey>_onyx_loader.js
//! ```
//!
//! `cleaned` is the request path without its leading slash, with `_`
//! escaped as `__` and `/` written as `_`. The root path is `index`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::path::split_href;

pub const LOADER_POSTFIX: &str = "_onyx_loader.js";
pub const ASSET_PREFIX: &str = "/assets/";
pub const DEV_ASSET_PREFIX: &str = "/_onyx/assets/";

const ROOT_NAME: &str = "index";

static CACHE_KEY_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_\d+_onyx_loader\.js$").expect("static regex"));
static REFETCH_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_refetch_\d+_$").expect("static regex"));

fn clean_path(href: &str) -> String {
    let (path, _query) = split_href(href);
    let path = path.trim_matches('/');
    if path.is_empty() {
        return ROOT_NAME.to_string();
    }
    path.replace('_', "__").replace('/', "_")
}

/// Loader URL for `href`. Query, hash and trailing slash are dropped.
///
/// ```
/// use onyx_router::loader_path::{decode_loader_path, encode_loader_path};
///
/// let url = encode_loader_path("/my_page/intro?x=1", 42);
/// assert_eq!(url, "/assets/my__page_intro_42_onyx_loader.js");
/// assert_eq!(decode_loader_path(&url).as_deref(), Some("/my_page/intro"));
/// ```
pub fn encode_loader_path(href: &str, cache_key: u64) -> String {
    format!(
        "{}{}_{}{}",
        ASSET_PREFIX,
        clean_path(href),
        cache_key,
        LOADER_POSTFIX
    )
}

/// Like [`encode_loader_path`] with a `_refetch_<n>_` cache-bust segment.
pub fn encode_refetch_path(href: &str, cache_key: u64, refetch: u64) -> String {
    format!(
        "{}{}_refetch_{}__{}{}",
        ASSET_PREFIX,
        clean_path(href),
        refetch,
        cache_key,
        LOADER_POSTFIX
    )
}

pub fn is_loader_path(path: &str) -> bool {
    path.ends_with(LOADER_POSTFIX)
}

/// Request path a loader URL stands for, or `None` when `path` is not a
/// loader URL.
///
/// Decoding reads left to right: `__` is a literal `_`, a lone `_` is `/`.
pub fn decode_loader_path(path: &str) -> Option<String> {
    if !is_loader_path(path) {
        return None;
    }

    let rest = path
        .strip_prefix(DEV_ASSET_PREFIX)
        .or_else(|| path.strip_prefix(ASSET_PREFIX))
        .unwrap_or_else(|| path.trim_start_matches('/'));

    let rest = match CACHE_KEY_SUFFIX.find(rest) {
        Some(m) => &rest[..m.start()],
        None => rest.strip_suffix(LOADER_POSTFIX)?,
    };
    let cleaned = match REFETCH_SUFFIX.find(rest) {
        Some(m) => &rest[..m.start()],
        None => rest,
    };

    if cleaned.is_empty() || cleaned == ROOT_NAME {
        return Some("/".to_string());
    }

    let mut decoded = String::with_capacity(cleaned.len() + 1);
    decoded.push('/');
    let mut chars = cleaned.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '_' if chars.peek() == Some(&'_') => {
                chars.next();
                decoded.push('_');
            }
            '_' => decoded.push('/'),
            other => decoded.push(other),
        }
    }
    Some(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("/docs/getting-started")]
    #[case("/_/docs/getting-started")]
    #[case("/_/terms")]
    #[case("/my_page/test")]
    #[case("/deep/nested/path/here")]
    #[case("/about")]
    #[case("/")]
    fn decodes_what_it_encodes(#[case] path: &str) {
        let url = encode_loader_path(path, 7);
        assert_eq!(decode_loader_path(&url).as_deref(), Some(path));
    }

    #[rstest]
    #[case("/docs/intro?foo=bar")]
    #[case("/docs/intro#section")]
    #[case("/docs/intro/")]
    fn strips_query_hash_and_trailing_slash(#[case] href: &str) {
        let url = encode_loader_path(href, 1);
        assert_eq!(decode_loader_path(&url).as_deref(), Some("/docs/intro"));
    }

    #[test]
    fn root_is_index() {
        assert_eq!(encode_loader_path("/", 5), "/assets/index_5_onyx_loader.js");
    }

    #[test]
    fn refetch_and_dev_prefix() {
        let url = encode_refetch_path("/docs/intro", 999, 12345);
        assert_eq!(url, "/assets/docs_intro_refetch_12345__999_onyx_loader.js");
        assert_eq!(decode_loader_path(&url).as_deref(), Some("/docs/intro"));
        assert_eq!(
            decode_loader_path("/_onyx/assets/docs_intro_999_onyx_loader.js").as_deref(),
            Some("/docs/intro")
        );
    }

    #[test]
    fn escaped_underscores() {
        assert_eq!(
            decode_loader_path("/assets/___docs_intro_999_onyx_loader.js").as_deref(),
            Some("/_/docs/intro")
        );
    }

    #[test]
    fn rejects_other_assets() {
        assert_eq!(decode_loader_path("/assets/app.js"), None);
        assert!(!is_loader_path("/docs/intro"));
    }
}
