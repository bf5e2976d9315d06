//! Integration tests for manifest building and request-time matching.

use onyx_router::route::pattern::compile_pattern;
use onyx_router::{
    build_manifest, ManifestBuilder, Params, Resolution, RouteFile, RouteKind, RouteMatcher,
    RoutesManifest,
};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;

fn app() -> RoutesManifest {
    ManifestBuilder::new("app")
        .with_files(vec![
            RouteFile::new("_layout.tsx"),
            RouteFile::new("index.tsx").with_loader(),
            RouteFile::new("about.tsx"),
            RouteFile::new("posts/[id].tsx").with_loader(),
            RouteFile::new("posts/new.tsx"),
            RouteFile::new("docs/[...slug].tsx").with_static_params(),
            RouteFile::new("dashboard+ssr/_layout.tsx"),
            RouteFile::new("dashboard+ssr/index.tsx").with_loader(),
            RouteFile::new("api/users/[id]+api.ts"),
            RouteFile::new("+not-found.tsx"),
            RouteFile::new("a/+not-found.tsx"),
            RouteFile::new("a/b/+not-found.tsx"),
            RouteFile::new("env.d.ts"),
        ])
        .build()
        .unwrap()
}

// ============================================================================
// Manifest shape
// ============================================================================

#[test]
fn partitions_by_kind() {
    let manifest = app();

    let pages = |entries: &[onyx_router::ManifestEntry]| {
        entries.iter().map(|e| e.page.clone()).collect::<Vec<_>>()
    };

    assert_eq!(pages(&manifest.api_routes), vec!["/api/users/[id]"]);
    assert_eq!(pages(&manifest.spa_routes), vec!["/posts/new", "/about"]);
    assert_eq!(
        pages(&manifest.ssg_routes),
        vec!["/posts/[id]", "/docs/[...slug]", "/dashboard", "/"]
    );
    assert_eq!(
        pages(&manifest.not_found_routes),
        vec!["/a/b/+not-found", "/a/+not-found", "/+not-found"]
    );

    let dashboard = &manifest.ssg_routes[2];
    assert_eq!(dashboard.kind, RouteKind::Ssr);
    assert_eq!(
        dashboard.layouts.as_deref(),
        Some(&["_layout.tsx".to_string(), "dashboard+ssr/_layout.tsx".to_string()][..])
    );
    assert_eq!(manifest.api_routes[0].layouts, None);
}

#[test]
fn serializes_in_manifest_shape() {
    let manifest = build_manifest("app", vec![RouteFile::new("posts/[id].tsx").with_loader()])
        .unwrap();
    let value = serde_json::to_value(&manifest).unwrap();

    assert_eq!(
        value,
        json!({
            "apiRoutes": [],
            "spaRoutes": [],
            "ssgRoutes": [{
                "file": "posts/[id].tsx",
                "page": "/posts/[id]",
                "type": "ssg",
                "namedRegex": "^/posts/(?P<id>[^/]+?)(?:/)?$",
                "routeKeys": { "id": "id" }
            }],
            "notFoundRoutes": []
        })
    );

    let back: RoutesManifest = serde_json::from_value(value).unwrap();
    assert_eq!(back, manifest);
}

// ============================================================================
// Matching
// ============================================================================

#[rstest]
#[case("/", "index.tsx")]
#[case("/about", "about.tsx")]
#[case("/about/", "about.tsx")]
#[case("/posts/new", "posts/new.tsx")]
#[case("/posts/17", "posts/[id].tsx")]
#[case("/docs/a/b/c", "docs/[...slug].tsx")]
#[case("/dashboard", "dashboard+ssr/index.tsx")]
fn first_match_in_specificity_order(#[case] path: &str, #[case] file: &str) {
    let manifest = app();
    let matcher = RouteMatcher::new(&manifest).unwrap();
    assert_eq!(matcher.match_page(path).unwrap().entry.file, file);
}

#[test]
fn static_beats_dynamic_regardless_of_input_order() {
    for files in [
        vec![RouteFile::new("posts/[id].tsx"), RouteFile::new("posts/new.tsx")],
        vec![RouteFile::new("posts/new.tsx"), RouteFile::new("posts/[id].tsx")],
    ] {
        let manifest = build_manifest("app", files).unwrap();
        let matcher = RouteMatcher::new(&manifest).unwrap();
        assert_eq!(matcher.match_page("/posts/new").unwrap().entry.file, "posts/new.tsx");
    }
}

#[test]
fn api_routes_match_separately() {
    let manifest = app();
    let matcher = RouteMatcher::new(&manifest).unwrap();

    let found = matcher.match_api("/api/users/9").unwrap();
    assert_eq!(found.params["id"], "9");
    assert!(matcher.match_page("/api/users/9").is_none());
}

#[rstest]
#[case("/a/b/c/invalid", "a/b/+not-found.tsx")]
#[case("/a/b", "a/b/+not-found.tsx")]
#[case("/a/x", "a/+not-found.tsx")]
#[case("/zzz/yyy", "+not-found.tsx")]
fn nearest_boundary_wins(#[case] path: &str, #[case] boundary: &str) {
    let manifest = app();
    let matcher = RouteMatcher::new(&manifest).unwrap();

    match matcher.resolve(path) {
        Resolution::Boundary(found) => assert_eq!(found.entry.file, boundary),
        other => panic!("expected boundary for {}, got {:?}", path, other),
    }
}

#[test]
fn dynamic_boundary_scope_captures_params() {
    let manifest = build_manifest(
        "app",
        vec![
            RouteFile::new("index.tsx"),
            RouteFile::new("docs/[version]/+not-found.tsx"),
        ],
    )
    .unwrap();
    let matcher = RouteMatcher::new(&manifest).unwrap();

    let found = matcher.nearest_boundary("/docs/v2/missing/page").unwrap();
    assert_eq!(found.params["version"], "v2");
    assert!(matcher.nearest_boundary("/other").is_none());
    assert_eq!(matcher.resolve("/other"), Resolution::Default);
}

// ============================================================================
// Pattern properties
// ============================================================================

#[rstest]
#[case("/users/[id]", &[("id", "42")])]
#[case("/shop/[category]/[item]", &[("category", "books"), ("item", "rust-in-action")])]
#[case("/docs/$...path", &[("path", "guide/install/linux")])]
#[case("/u/$user/files/[...rest]", &[("user", "me"), ("rest", "a/b.txt")])]
fn matching_extracts_substituted_values(#[case] pattern: &str, #[case] values: &[(&str, &str)]) {
    let compiled = compile_pattern(pattern).unwrap();
    let params: Params = values
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    let concrete = compiled.try_interpolate(&params).unwrap();
    assert_eq!(compiled.captures(&concrete), Some(params));
}
