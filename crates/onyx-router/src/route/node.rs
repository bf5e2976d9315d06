//! Route-file classification.
//!
//! Turns a path relative to the routes directory (`blog+ssg/[slug].tsx`) plus
//! the exports the build collaborator found in it into a [`RouteNode`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::pattern::{classify_segment, segments_to_pattern, PatternError, Segment};

static MODE_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<name>.*)\+(?P<mode>api|ssg|ssr|spa)$").expect("static mode-suffix regex")
});

const ROUTE_EXTENSIONS: [&str; 4] = [".tsx", ".ts", ".jsx", ".js"];

/// Rendering strategy of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RouteKind {
    Api,
    Ssg,
    Ssr,
    Spa,
    NotFound,
}

impl RouteKind {
    fn from_suffix(mode: &str) -> Option<Self> {
        match mode {
            "api" => Some(RouteKind::Api),
            "ssg" => Some(RouteKind::Ssg),
            "ssr" => Some(RouteKind::Ssr),
            "spa" => Some(RouteKind::Spa),
            _ => None,
        }
    }

    pub fn is_page(&self) -> bool {
        matches!(self, RouteKind::Ssg | RouteKind::Ssr | RouteKind::Spa)
    }

    /// Whether requests for this kind run a loader before rendering.
    pub fn runs_loader(&self) -> bool {
        matches!(self, RouteKind::Ssg | RouteKind::Ssr)
    }
}

/// Named exports detected in a route file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteExports {
    pub loader: bool,
    pub generate_static_params: bool,
}

/// A discovered file, relative to the routes directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteFile {
    pub path: String,
    pub exports: RouteExports,
}

impl RouteFile {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            exports: RouteExports::default(),
        }
    }

    pub fn with_loader(mut self) -> Self {
        self.exports.loader = true;
        self
    }

    pub fn with_static_params(mut self) -> Self {
        self.exports.generate_static_params = true;
        self
    }

    pub fn with_exports(mut self, exports: RouteExports) -> Self {
        self.exports = exports;
        self
    }
}

/// A `_layout` file and the directory it governs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub file: String,
    dir: Vec<String>,
}

impl Layout {
    /// True when `dir` is this layout's directory or below it.
    fn governs(&self, dir: &[String]) -> bool {
        dir.starts_with(&self.dir)
    }
}

/// A classified route. Immutable once the manifest is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteNode {
    pub file: String,
    pub page_pattern: String,
    pub segments: Vec<Segment>,
    pub layouts: Vec<Layout>,
    pub kind: RouteKind,
    dir: Vec<String>,
}

impl RouteNode {
    /// Segments of the directory this boundary covers. Only meaningful for
    /// [`RouteKind::NotFound`] nodes, whose last segment is the implicit
    /// catch-all.
    pub fn boundary_scope(&self) -> &[Segment] {
        match self.kind {
            RouteKind::NotFound => &self.segments[..self.segments.len().saturating_sub(1)],
            _ => &self.segments,
        }
    }
}

/// What a discovered file turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    Route(RouteNode),
    Layout(Layout),
    /// Not a route source (`.d.ts`, assets, `+html` and friends).
    Skipped,
}

/// Fold accumulator for the directory part of a file path.
#[derive(Default)]
struct DirState {
    raw: Vec<String>,
    segments: Vec<Segment>,
    mode: Option<RouteKind>,
}

impl DirState {
    fn with_dir(mut self, part: &str) -> Result<Self, PatternError> {
        self.raw.push(part.to_string());

        let name = match MODE_SUFFIX.captures(part) {
            Some(caps) => {
                // nearest directory suffix wins
                self.mode = RouteKind::from_suffix(&caps["mode"]);
                caps["name"].to_string()
            }
            None => part.to_string(),
        };

        if !is_group(&name) && !name.is_empty() {
            self.segments.push(classify_segment(&name)?);
        }
        Ok(self)
    }
}

fn is_group(name: &str) -> bool {
    name.starts_with('(') && name.ends_with(')')
}

/// Strips `./`, backslashes and the script extension. `None` for files that
/// are not route sources.
fn route_stem(path: &str) -> Option<String> {
    let path = path.replace('\\', "/");
    let path = path.trim_start_matches("./").trim_start_matches('/');
    if path.ends_with(".d.ts") {
        return None;
    }
    ROUTE_EXTENSIONS
        .iter()
        .find_map(|ext| path.strip_suffix(ext))
        .map(str::to_string)
}

/// Classifies one discovered file.
///
/// `default_loader_mode` is the kind given to files that export a `loader`
/// but neither `generateStaticParams` nor a strategy suffix.
///
/// ```
/// use onyx_router::route::{classify_file, Classified, RouteFile, RouteKind};
///
/// let file = RouteFile::new("(marketing)/blog/[slug].tsx").with_loader();
/// let Classified::Route(node) = classify_file(&file, RouteKind::Ssg).unwrap() else {
///     panic!("expected a route");
/// };
/// assert_eq!(node.page_pattern, "/blog/[slug]");
/// assert_eq!(node.kind, RouteKind::Ssg);
/// ```
pub fn classify_file(
    file: &RouteFile,
    default_loader_mode: RouteKind,
) -> Result<Classified, PatternError> {
    let Some(stem) = route_stem(&file.path) else {
        return Ok(Classified::Skipped);
    };

    let mut parts: Vec<&str> = stem.split('/').filter(|p| !p.is_empty()).collect();
    let Some(file_name) = parts.pop() else {
        return Ok(Classified::Skipped);
    };

    let dirs = parts
        .iter()
        .try_fold(DirState::default(), |state, part| state.with_dir(part))?;

    if file_name == "_layout" {
        return Ok(Classified::Layout(Layout {
            file: file.path.clone(),
            dir: dirs.raw,
        }));
    }

    if file_name == "+not-found" {
        let mut segments = dirs.segments;
        segments.push(Segment::CatchAll("not-found".to_string()));
        let scope = segments_to_pattern(&segments[..segments.len() - 1]);
        let page_pattern = if scope == "/" {
            "/+not-found".to_string()
        } else {
            format!("{}/+not-found", scope)
        };
        return Ok(Classified::Route(RouteNode {
            file: file.path.clone(),
            page_pattern,
            segments,
            layouts: Vec::new(),
            kind: RouteKind::NotFound,
            dir: dirs.raw,
        }));
    }

    // `+html`, `+middleware` and other special files are not routes
    let (name, file_mode) = match MODE_SUFFIX.captures(file_name) {
        Some(caps) => (
            caps["name"].to_string(),
            RouteKind::from_suffix(&caps["mode"]),
        ),
        None if file_name.starts_with('+') => return Ok(Classified::Skipped),
        None => (file_name.to_string(), None),
    };

    let mut segments = dirs.segments;
    if name != "index" && !name.is_empty() && !is_group(&name) {
        segments.push(classify_segment(&name)?);
    }

    let kind = file_mode.or(dirs.mode).unwrap_or(if file.exports.generate_static_params {
        RouteKind::Ssg
    } else if file.exports.loader {
        default_loader_mode
    } else {
        RouteKind::Spa
    });

    Ok(Classified::Route(RouteNode {
        file: file.path.clone(),
        page_pattern: segments_to_pattern(&segments),
        segments,
        layouts: Vec::new(),
        kind,
        dir: dirs.raw,
    }))
}

/// Attaches every layout governing a node's directory, root first.
pub fn attach_layouts(node: &mut RouteNode, layouts: &[Layout]) {
    if node.kind == RouteKind::Api {
        return;
    }
    let mut governing: Vec<&Layout> = layouts.iter().filter(|l| l.governs(&node.dir)).collect();
    governing.sort_by_key(|l| l.dir.len());
    node.layouts = governing.into_iter().cloned().collect();
}

/// Specificity order of two segment lists.
///
/// Segment-wise: static before dynamic before catch-all. When one list is a
/// prefix of the other the deeper route comes first. Anything else is a tie,
/// left to the caller's stable sort.
pub fn compare_specificity(a: &[Segment], b: &[Segment]) -> Ordering {
    for (left, right) in a.iter().zip(b) {
        let by_weight = left.weight().cmp(&right.weight());
        if by_weight != Ordering::Equal {
            return by_weight;
        }
    }
    b.len().cmp(&a.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn route(file: RouteFile) -> RouteNode {
        match classify_file(&file, RouteKind::Ssg).unwrap() {
            Classified::Route(node) => node,
            other => panic!("expected route, got {:?}", other),
        }
    }

    #[rstest]
    #[case("index.tsx", "/")]
    #[case("about.tsx", "/about")]
    #[case("blog/index.tsx", "/blog")]
    #[case("blog/[slug].tsx", "/blog/[slug]")]
    #[case("blog/$slug.tsx", "/blog/[slug]")]
    #[case("docs/[...path].tsx", "/docs/[...path]")]
    #[case("(auth)/login.tsx", "/login")]
    #[case("(app)/(nested)/index.tsx", "/")]
    #[case("./shop\\cart.jsx", "/shop/cart")]
    fn page_patterns(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(route(RouteFile::new(path)).page_pattern, expected);
    }

    #[rstest]
    #[case(RouteFile::new("a.tsx"), RouteKind::Spa)]
    #[case(RouteFile::new("a.tsx").with_loader(), RouteKind::Ssg)]
    #[case(RouteFile::new("a.tsx").with_static_params().with_loader(), RouteKind::Ssg)]
    #[case(RouteFile::new("a+ssr.tsx").with_static_params(), RouteKind::Ssr)]
    #[case(RouteFile::new("a+spa.tsx").with_loader(), RouteKind::Spa)]
    #[case(RouteFile::new("api/users+api.ts"), RouteKind::Api)]
    #[case(RouteFile::new("blog+ssr/[slug].tsx"), RouteKind::Ssr)]
    #[case(RouteFile::new("blog+ssr/drafts+spa/[slug].tsx"), RouteKind::Spa)]
    #[case(RouteFile::new("blog+ssr/post+ssg.tsx"), RouteKind::Ssg)]
    fn strategy_selection(#[case] file: RouteFile, #[case] expected: RouteKind) {
        assert_eq!(route(file).kind, expected);
    }

    #[test]
    fn loader_only_uses_default_mode() {
        let file = RouteFile::new("feed.tsx").with_loader();
        let Classified::Route(node) = classify_file(&file, RouteKind::Ssr).unwrap() else {
            panic!("expected route");
        };
        assert_eq!(node.kind, RouteKind::Ssr);
    }

    #[test]
    fn directory_suffix_is_not_part_of_url() {
        let node = route(RouteFile::new("blog+ssg/[slug].tsx"));
        assert_eq!(node.page_pattern, "/blog/[slug]");
    }

    #[test]
    fn not_found_boundary() {
        let node = route(RouteFile::new("docs/[version]/+not-found.tsx"));
        assert_eq!(node.kind, RouteKind::NotFound);
        assert_eq!(node.page_pattern, "/docs/[version]/+not-found");
        assert_eq!(
            segments_to_pattern(node.boundary_scope()),
            "/docs/[version]"
        );

        let root = route(RouteFile::new("+not-found.tsx"));
        assert_eq!(root.page_pattern, "/+not-found");
        assert!(root.boundary_scope().is_empty());
    }

    #[rstest]
    #[case("types.d.ts")]
    #[case("styles.css")]
    #[case("+html.tsx")]
    fn skipped_files(#[case] path: &str) {
        assert_eq!(
            classify_file(&RouteFile::new(path), RouteKind::Ssg).unwrap(),
            Classified::Skipped
        );
    }

    #[test]
    fn layouts_attach_root_first() {
        let layouts: Vec<Layout> = ["_layout.tsx", "(app)/_layout.tsx", "(app)/dash/_layout.tsx", "other/_layout.tsx"]
            .iter()
            .map(|p| match classify_file(&RouteFile::new(*p), RouteKind::Ssg).unwrap() {
                Classified::Layout(layout) => layout,
                other => panic!("expected layout, got {:?}", other),
            })
            .collect();

        let mut node = route(RouteFile::new("(app)/dash/settings.tsx"));
        attach_layouts(&mut node, &layouts);
        let files: Vec<&str> = node.layouts.iter().map(|l| l.file.as_str()).collect();
        assert_eq!(
            files,
            vec!["_layout.tsx", "(app)/_layout.tsx", "(app)/dash/_layout.tsx"]
        );
    }

    #[test]
    fn static_outranks_dynamic_outranks_catch_all() {
        let stat = route(RouteFile::new("posts/new.tsx")).segments;
        let dynamic = route(RouteFile::new("posts/[id].tsx")).segments;
        let catch_all = route(RouteFile::new("posts/[...rest].tsx")).segments;

        assert_eq!(compare_specificity(&stat, &dynamic), Ordering::Less);
        assert_eq!(compare_specificity(&dynamic, &catch_all), Ordering::Less);
        assert_eq!(compare_specificity(&catch_all, &stat), Ordering::Greater);
    }

    #[test]
    fn deeper_static_prefix_wins() {
        let deep = route(RouteFile::new("a/b/[id].tsx")).segments;
        let shallow = route(RouteFile::new("a/[id].tsx")).segments;
        let prefix = route(RouteFile::new("a/b.tsx")).segments;

        assert_eq!(compare_specificity(&deep, &shallow), Ordering::Less);
        assert_eq!(compare_specificity(&deep, &prefix), Ordering::Less);
    }
}
