//! # Onyx Router
//!
//! File-system route resolution for the Onyx framework:
//! - Route patterns (`/posts/[id]`, `/posts/$id`, `/docs/[...slug]`)
//! - File classification into API / SSG / SSR / SPA routes and `+not-found`
//!   boundaries, with strategy suffixes (`+ssr`, `+ssg`, `+spa`, `+api`)
//! - A ranked, JSON-serializable routes manifest
//! - URL masks with a reload-safe encoded suffix
//! - Validator adapters for route params and search params
//!
//! ## Matching order
//!
//! Within one directory level static segments beat dynamic ones and dynamic
//! segments beat catch-alls. Unmatched paths fall back to the nearest
//! ancestor `+not-found` boundary.
//!
//! ## Example
//!
//! ```
//! use onyx_router::{ManifestBuilder, Resolution, RouteFile, RouteMatcher};
//!
//! let manifest = ManifestBuilder::new("app")
//!     .with_file(RouteFile::new("posts/[id].tsx").with_loader())
//!     .with_file(RouteFile::new("posts/new.tsx"))
//!     .with_file(RouteFile::new("+not-found.tsx"))
//!     .build()
//!     .unwrap();
//! let matcher = RouteMatcher::new(&manifest).unwrap();
//!
//! let found = matcher.match_page("/posts/new").unwrap();
//! assert_eq!(found.entry.file, "posts/new.tsx");
//!
//! let found = matcher.match_page("/posts/42").unwrap();
//! assert_eq!(found.params["id"], "42");
//!
//! assert!(matches!(matcher.resolve("/nope/at/all"), Resolution::Boundary(_)));
//! ```

pub mod loader_path;
pub mod manifest;
pub mod mask;
pub mod path;
pub mod route;
pub mod search;
pub mod validate;

pub use manifest::{
    build_manifest, ManifestBuilder, ManifestEntry, ManifestError, Resolution, RouteMatch,
    RouteMatcher, RoutesManifest,
};
pub use mask::{
    create_route_mask, find_matching_mask, MaskEngine, MaskMatch, MaskParams, MaskState,
    RouteMask, RouteMaskOptions,
};
pub use path::{normalize_path, Ancestors};
pub use route::{Params, PatternError, RouteExports, RouteFile, RouteKind, RouteNode, Segment};
pub use validate::{
    validate, Issue, ValidationError, ValidationTarget, Validator, ValidatorConfigError,
    ValidatorExport,
};
