//! Route pattern compilation.
//!
//! A pattern is a `/`-separated list of segments:
//!
//! | Segment            | Meaning                 | Regex        |
//! |--------------------|-------------------------|--------------|
//! | `about`            | static text             | escaped text |
//! | `[id]` or `$id`    | one dynamic segment     | `([^/]+)`    |
//! | `[...rest]` or `$...rest` | one or more segments | `(.+)`  |
//!
//! The compiled expression is always anchored on both ends, so partial
//! matches never succeed.

use regex::Regex;
use std::collections::HashMap;
use thiserror::Error;

/// Captured route parameters, keyed by parameter name.
pub type Params = HashMap<String, String>;

/// One segment of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Static(String),
    Dynamic(String),
    CatchAll(String),
}

impl Segment {
    /// Ordering weight used by specificity sorting: static < dynamic < catch-all.
    pub fn weight(&self) -> u8 {
        match self {
            Segment::Static(_) => 0,
            Segment::Dynamic(_) => 1,
            Segment::CatchAll(_) => 2,
        }
    }

    pub fn param_name(&self) -> Option<&str> {
        match self {
            Segment::Static(_) => None,
            Segment::Dynamic(name) | Segment::CatchAll(name) => Some(name),
        }
    }

    pub fn is_static(&self) -> bool {
        matches!(self, Segment::Static(_))
    }

    /// Canonical bracket spelling (`$id` is written back as `[id]`).
    pub fn to_bracket(&self) -> String {
        match self {
            Segment::Static(text) => text.clone(),
            Segment::Dynamic(name) => format!("[{}]", name),
            Segment::CatchAll(name) => format!("[...{}]", name),
        }
    }

    fn to_regex(&self) -> String {
        match self {
            Segment::Static(text) => regex::escape(text),
            Segment::Dynamic(_) => "([^/]+)".to_string(),
            Segment::CatchAll(_) => "(.+)".to_string(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("segment `{segment}` declares a parameter without a name")]
    EmptyParam { segment: String },

    #[error("pattern `{pattern}` did not compile: {message}")]
    Regex { pattern: String, message: String },
}

/// Classifies one path segment.
///
/// ```
/// use onyx_router::route::pattern::{classify_segment, Segment};
///
/// assert_eq!(classify_segment("about").unwrap(), Segment::Static("about".into()));
/// assert_eq!(classify_segment("[id]").unwrap(), Segment::Dynamic("id".into()));
/// assert_eq!(classify_segment("$id").unwrap(), Segment::Dynamic("id".into()));
/// assert_eq!(classify_segment("[...rest]").unwrap(), Segment::CatchAll("rest".into()));
/// assert_eq!(classify_segment("$...rest").unwrap(), Segment::CatchAll("rest".into()));
/// ```
pub fn classify_segment(segment: &str) -> Result<Segment, PatternError> {
    let named = |name: &str, make: fn(String) -> Segment| {
        if name.is_empty() {
            Err(PatternError::EmptyParam {
                segment: segment.to_string(),
            })
        } else {
            Ok(make(name.to_string()))
        }
    };

    if let Some(inner) = segment.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        return match inner.strip_prefix("...") {
            Some(name) => named(name, Segment::CatchAll),
            None => named(inner, Segment::Dynamic),
        };
    }

    if let Some(inner) = segment.strip_prefix('$') {
        return match inner.strip_prefix("...") {
            Some(name) => named(name, Segment::CatchAll),
            None => named(inner, Segment::Dynamic),
        };
    }

    Ok(Segment::Static(segment.to_string()))
}

/// Splits a pattern into typed segments, ignoring empty ones.
pub fn parse_segments(pattern: &str) -> Result<Vec<Segment>, PatternError> {
    pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .map(classify_segment)
        .collect()
}

/// Writes segments back as a canonical `/`-rooted pattern.
pub fn segments_to_pattern(segments: &[Segment]) -> String {
    if segments.is_empty() {
        return "/".to_string();
    }
    segments
        .iter()
        .map(|segment| format!("/{}", segment.to_bracket()))
        .collect()
}

/// An anchored matcher plus the parameter names in capture order.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    source: String,
    segments: Vec<Segment>,
    regex: Regex,
    param_names: Vec<String>,
}

impl CompiledPattern {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Zips capture groups back onto the parameter names by position.
    ///
    /// A name that appears twice keeps the value of its last occurrence.
    pub fn captures(&self, path: &str) -> Option<Params> {
        let caps = self.regex.captures(path)?;
        let mut params = Params::with_capacity(self.param_names.len());
        for (index, name) in self.param_names.iter().enumerate() {
            if let Some(value) = caps.get(index + 1) {
                params.insert(name.clone(), value.as_str().to_string());
            }
        }
        Some(params)
    }

    /// Substitutes `params` into the pattern. Missing parameters become
    /// empty segments.
    pub fn interpolate(&self, params: &Params) -> String {
        interpolate_segments(&self.segments, params)
    }

    /// Like [`interpolate`](Self::interpolate) but fails on any missing
    /// parameter.
    pub fn try_interpolate(&self, params: &Params) -> Option<String> {
        let parts: Option<Vec<String>> = self
            .segments
            .iter()
            .map(|segment| match segment {
                Segment::Static(text) => Some(text.clone()),
                Segment::Dynamic(name) | Segment::CatchAll(name) => params.get(name).cloned(),
            })
            .collect();
        parts.map(|parts| {
            if parts.is_empty() {
                "/".to_string()
            } else {
                format!("/{}", parts.join("/"))
            }
        })
    }
}

/// Lenient substitution shared with the mask engine.
pub fn interpolate_segments(segments: &[Segment], params: &Params) -> String {
    if segments.is_empty() {
        return "/".to_string();
    }
    segments
        .iter()
        .map(|segment| match segment {
            Segment::Static(text) => format!("/{}", text),
            Segment::Dynamic(name) | Segment::CatchAll(name) => {
                format!("/{}", params.get(name).map(String::as_str).unwrap_or(""))
            }
        })
        .collect()
}

/// Compiles a route pattern into an anchored regex and ordered parameter
/// names.
///
/// ```
/// use onyx_router::route::pattern::compile_pattern;
///
/// let compiled = compile_pattern("/photos/[id]/modal").unwrap();
/// assert_eq!(compiled.regex().as_str(), "^/photos/([^/]+)/modal$");
/// assert_eq!(compiled.param_names(), &["id".to_string()]);
///
/// let params = compiled.captures("/photos/5/modal").unwrap();
/// assert_eq!(params["id"], "5");
/// assert!(compiled.captures("/photos/5/modal/extra").is_none());
/// ```
pub fn compile_pattern(pattern: &str) -> Result<CompiledPattern, PatternError> {
    let segments = parse_segments(pattern)?;

    let body = segments
        .iter()
        .map(Segment::to_regex)
        .collect::<Vec<_>>()
        .join("/");
    let expression = format!("^/{}$", body);

    let regex = Regex::new(&expression).map_err(|err| PatternError::Regex {
        pattern: pattern.to_string(),
        message: err.to_string(),
    })?;

    let param_names = segments
        .iter()
        .filter_map(|segment| segment.param_name().map(str::to_string))
        .collect();

    Ok(CompiledPattern {
        source: pattern.to_string(),
        segments,
        regex,
        param_names,
    })
}
