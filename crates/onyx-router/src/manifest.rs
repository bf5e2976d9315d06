//! Routes manifest: the ordered, JSON-serializable table of every route.
//!
//! [`ManifestBuilder`] classifies discovered files and ranks them;
//! [`RouteMatcher`] compiles a manifest for request-time lookup.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::path::{normalize_path, Ancestors};
use crate::route::pattern::{
    compile_pattern, parse_segments, segments_to_pattern, CompiledPattern, Params,
};
use crate::route::{
    attach_layouts, classify_file, compare_specificity, Classified, PatternError, RouteFile,
    RouteKind, RouteNode, Segment,
};

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W").expect("static regex"));

const MAX_KEY_LEN: usize = 30;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("no routes found in `{dir}`")]
    NoRoutes { dir: String },

    #[error("invalid route file `{file}`: {source}")]
    Pattern {
        file: String,
        #[source]
        source: PatternError,
    },

    #[error("manifest entry `{page}` has an invalid regex: {source}")]
    Regex {
        page: String,
        #[source]
        source: regex::Error,
    },
}

/// One route in the serialized manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub file: String,
    pub page: String,
    #[serde(rename = "type")]
    pub kind: RouteKind,
    pub named_regex: String,
    /// Regex group key to parameter name.
    pub route_keys: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layouts: Option<Vec<String>>,
}

/// The four manifest partitions. SSR routes live in `ssg_routes` and are
/// told apart by their `type`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutesManifest {
    pub api_routes: Vec<ManifestEntry>,
    pub spa_routes: Vec<ManifestEntry>,
    pub ssg_routes: Vec<ManifestEntry>,
    pub not_found_routes: Vec<ManifestEntry>,
}

impl RoutesManifest {
    pub fn is_empty(&self) -> bool {
        self.api_routes.is_empty() && self.spa_routes.is_empty() && self.ssg_routes.is_empty()
    }

    pub fn route_count(&self) -> usize {
        self.api_routes.len() + self.spa_routes.len() + self.ssg_routes.len()
    }
}

/// Generates `a`, `b`, ... `z`, `aa`, `ab`, ... skipping keys already taken.
#[derive(Default)]
struct SafeKeys {
    next: usize,
}

impl SafeKeys {
    fn next_free(&mut self, used: &HashSet<String>) -> String {
        loop {
            let key = Self::key_for(self.next);
            self.next += 1;
            if !used.contains(&key) {
                return key;
            }
        }
    }

    fn key_for(mut n: usize) -> String {
        let mut key = Vec::new();
        loop {
            key.push(b'a' + (n % 26) as u8);
            if n < 26 {
                break;
            }
            n = n / 26 - 1;
        }
        key.reverse();
        String::from_utf8_lossy(&key).into_owned()
    }
}

fn is_valid_key(key: &str, used: &HashSet<String>) -> bool {
    !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && !key.starts_with(|c: char| c.is_ascii_digit())
        && !used.contains(key)
}

/// Builds the named-group regex and group-key map for a list of segments.
///
/// ```
/// use onyx_router::manifest::named_route_regex;
/// use onyx_router::route::pattern::parse_segments;
///
/// let (regex, keys) = named_route_regex(&parse_segments("/posts/[id]").unwrap());
/// assert_eq!(regex, "^/posts/(?P<id>[^/]+?)(?:/)?$");
/// assert_eq!(keys["id"], "id");
/// ```
pub fn named_route_regex(segments: &[Segment]) -> (String, BTreeMap<String, String>) {
    let mut keys = BTreeMap::new();
    let mut used = HashSet::new();
    let mut safe = SafeKeys::default();
    let mut body = String::new();

    for segment in segments {
        let (name, group) = match segment {
            Segment::Static(text) => {
                body.push('/');
                body.push_str(&regex::escape(text));
                continue;
            }
            Segment::Dynamic(name) => (name, "[^/]+?"),
            Segment::CatchAll(name) => (name, ".+?"),
        };

        let cleaned = NON_WORD.replace_all(name, "").into_owned();
        let key = if is_valid_key(&cleaned, &used) {
            cleaned
        } else {
            safe.next_free(&used)
        };

        body.push_str(&format!("/(?P<{}>{})", key, group));
        used.insert(key.clone());
        keys.insert(key, name.clone());
    }

    let body = if body.is_empty() { "/".to_string() } else { body };
    (format!("^{}(?:/)?$", body), keys)
}

/// Collects discovered route files into a [`RoutesManifest`].
///
/// ```
/// use onyx_router::manifest::ManifestBuilder;
/// use onyx_router::route::RouteFile;
///
/// let manifest = ManifestBuilder::new("app")
///     .with_file(RouteFile::new("index.tsx"))
///     .with_file(RouteFile::new("posts/[id].tsx").with_loader())
///     .build()
///     .unwrap();
///
/// assert_eq!(manifest.spa_routes.len(), 1);
/// assert_eq!(manifest.ssg_routes[0].page, "/posts/[id]");
/// ```
#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    dir: String,
    default_loader_mode: RouteKind,
    files: Vec<RouteFile>,
}

impl ManifestBuilder {
    pub fn new(dir: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            default_loader_mode: RouteKind::Ssg,
            files: Vec::new(),
        }
    }

    pub fn with_default_loader_mode(mut self, mode: RouteKind) -> Self {
        self.default_loader_mode = mode;
        self
    }

    pub fn with_file(mut self, file: RouteFile) -> Self {
        self.files.push(file);
        self
    }

    pub fn with_files<I>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = RouteFile>,
    {
        self.files.extend(files);
        self
    }

    pub fn build(self) -> Result<RoutesManifest, ManifestError> {
        let mut files = self.files;
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let mut nodes = Vec::new();
        let mut layouts = Vec::new();
        for file in &files {
            let classified = classify_file(file, self.default_loader_mode).map_err(|source| {
                ManifestError::Pattern {
                    file: file.path.clone(),
                    source,
                }
            })?;
            match classified {
                Classified::Route(node) => nodes.push(node),
                Classified::Layout(layout) => layouts.push(layout),
                Classified::Skipped => debug!(file = %file.path, "Skipping non-route file"),
            }
        }

        for node in &mut nodes {
            attach_layouts(node, &layouts);
        }
        nodes.sort_by(|a, b| compare_specificity(&a.segments, &b.segments));

        let mut manifest = RoutesManifest::default();
        let mut seen: HashMap<(bool, String), String> = HashMap::new();

        for node in nodes {
            if node.kind != RouteKind::NotFound {
                let shape = (node.kind == RouteKind::Api, route_shape(&node.segments));
                if let Some(first) = seen.get(&shape) {
                    warn!(
                        page = %node.page_pattern,
                        kept = %first,
                        ignored = %node.file,
                        "Duplicate route, keeping the first"
                    );
                    continue;
                }
                seen.insert(shape, node.file.clone());
            }

            let kind = node.kind;
            let entry = to_entry(node);
            match kind {
                RouteKind::Api => manifest.api_routes.push(entry),
                RouteKind::Spa => manifest.spa_routes.push(entry),
                RouteKind::Ssg | RouteKind::Ssr => manifest.ssg_routes.push(entry),
                RouteKind::NotFound => manifest.not_found_routes.push(entry),
            }
        }

        if manifest.is_empty() {
            return Err(ManifestError::NoRoutes { dir: self.dir });
        }

        info!(
            dir = %self.dir,
            api = manifest.api_routes.len(),
            spa = manifest.spa_routes.len(),
            ssg = manifest.ssg_routes.len(),
            not_found = manifest.not_found_routes.len(),
            "Built routes manifest"
        );
        Ok(manifest)
    }
}

/// Shorthand for `ManifestBuilder::new(dir).with_files(files).build()`.
pub fn build_manifest<I>(dir: &str, files: I) -> Result<RoutesManifest, ManifestError>
where
    I: IntoIterator<Item = RouteFile>,
{
    ManifestBuilder::new(dir).with_files(files).build()
}

/// Page path with parameter names erased: `/posts/[id]` and `/posts/[slug]`
/// match the same URLs.
fn route_shape(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|segment| match segment {
            Segment::Static(text) => format!("/{}", text),
            Segment::Dynamic(_) => "/[]".to_string(),
            Segment::CatchAll(_) => "/[...]".to_string(),
        })
        .collect()
}

fn to_entry(node: RouteNode) -> ManifestEntry {
    let (named_regex, route_keys) = named_route_regex(&node.segments);
    let layouts = if node.layouts.is_empty() {
        None
    } else {
        Some(node.layouts.iter().map(|l| l.file.clone()).collect())
    };
    ManifestEntry {
        file: node.file,
        page: node.page_pattern,
        kind: node.kind,
        named_regex,
        route_keys,
        layouts,
    }
}

/// A manifest entry with its regex compiled.
#[derive(Debug, Clone)]
pub struct CompiledEntry {
    entry: ManifestEntry,
    regex: Regex,
    segments: Vec<Segment>,
}

impl CompiledEntry {
    pub fn compile(entry: ManifestEntry) -> Result<Self, ManifestError> {
        let regex = Regex::new(&entry.named_regex).map_err(|source| ManifestError::Regex {
            page: entry.page.clone(),
            source,
        })?;
        let segments = page_segments(&entry)?;
        Ok(Self {
            entry,
            regex,
            segments,
        })
    }

    pub fn entry(&self) -> &ManifestEntry {
        &self.entry
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Parameters captured from `path`, resolved through `routeKeys` in
    /// capture order. Repeated parameter names keep the last value.
    pub fn params(&self, path: &str) -> Option<Params> {
        let caps = self.regex.captures(path)?;
        let mut params = Params::new();
        for key in self.regex.capture_names().flatten() {
            if let (Some(value), Some(name)) = (caps.name(key), self.entry.route_keys.get(key)) {
                params.insert(name.clone(), value.as_str().to_string());
            }
        }
        Some(params)
    }
}

fn page_segments(entry: &ManifestEntry) -> Result<Vec<Segment>, ManifestError> {
    let page = match entry.kind {
        RouteKind::NotFound => entry.page.trim_end_matches("+not-found"),
        _ => entry.page.as_str(),
    };
    let mut segments = parse_segments(page).map_err(|source| ManifestError::Pattern {
        file: entry.file.clone(),
        source,
    })?;
    if entry.kind == RouteKind::NotFound {
        segments.push(Segment::CatchAll("not-found".to_string()));
    }
    Ok(segments)
}

/// A matched entry and its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch<'a> {
    pub entry: &'a ManifestEntry,
    pub params: Params,
}

/// Outcome of resolving a page request.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<'a> {
    Route(RouteMatch<'a>),
    /// No route matched; the nearest not-found boundary applies.
    Boundary(RouteMatch<'a>),
    /// No route and no boundary anywhere.
    Default,
}

#[derive(Debug, Clone)]
struct Boundary {
    compiled: CompiledEntry,
    scope: CompiledPattern,
}

/// Request-time view of a manifest.
#[derive(Debug, Clone)]
pub struct RouteMatcher {
    api: Vec<CompiledEntry>,
    pages: Vec<CompiledEntry>,
    boundaries: Vec<Boundary>,
}

impl RouteMatcher {
    pub fn new(manifest: &RoutesManifest) -> Result<Self, ManifestError> {
        let compile_all = |entries: &[ManifestEntry]| {
            entries
                .iter()
                .cloned()
                .map(CompiledEntry::compile)
                .collect::<Result<Vec<_>, _>>()
        };

        let api = compile_all(&manifest.api_routes)?;

        let mut pages = compile_all(&manifest.ssg_routes)?;
        pages.extend(compile_all(&manifest.spa_routes)?);
        pages.sort_by(|a, b| compare_specificity(&a.segments, &b.segments));

        let mut boundaries = compile_all(&manifest.not_found_routes)?
            .into_iter()
            .map(|compiled| {
                let scope_segments = &compiled.segments[..compiled.segments.len() - 1];
                let scope = compile_pattern(&segments_to_pattern(scope_segments)).map_err(
                    |source| ManifestError::Pattern {
                        file: compiled.entry.file.clone(),
                        source,
                    },
                )?;
                Ok(Boundary { compiled, scope })
            })
            .collect::<Result<Vec<_>, ManifestError>>()?;
        boundaries.sort_by(|a, b| compare_specificity(a.scope.segments(), b.scope.segments()));

        Ok(Self {
            api,
            pages,
            boundaries,
        })
    }

    pub fn match_api(&self, path: &str) -> Option<RouteMatch<'_>> {
        first_match(&self.api, path)
    }

    /// First page route, in specificity order, matching `path`.
    pub fn match_page(&self, path: &str) -> Option<RouteMatch<'_>> {
        first_match(&self.pages, path)
    }

    /// Nearest not-found boundary for `path`, walking up its ancestors.
    pub fn nearest_boundary(&self, path: &str) -> Option<RouteMatch<'_>> {
        let normalized = normalize_path(path);
        Ancestors::new(&normalized).find_map(|ancestor| {
            self.boundaries.iter().find_map(|boundary| {
                boundary.scope.captures(ancestor).map(|params| RouteMatch {
                    entry: &boundary.compiled.entry,
                    params,
                })
            })
        })
    }

    pub fn resolve(&self, path: &str) -> Resolution<'_> {
        if let Some(found) = self.match_page(path) {
            return Resolution::Route(found);
        }
        match self.nearest_boundary(path) {
            Some(boundary) => Resolution::Boundary(boundary),
            None => Resolution::Default,
        }
    }

    /// Page entries in match order.
    pub fn pages(&self) -> impl Iterator<Item = &CompiledEntry> {
        self.pages.iter()
    }

    pub fn api_routes(&self) -> impl Iterator<Item = &CompiledEntry> {
        self.api.iter()
    }
}

fn first_match<'a>(entries: &'a [CompiledEntry], path: &str) -> Option<RouteMatch<'a>> {
    entries.iter().find_map(|compiled| {
        compiled.params(path).map(|params| RouteMatch {
            entry: &compiled.entry,
            params,
        })
    })
}
