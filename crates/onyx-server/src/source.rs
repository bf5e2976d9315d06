//! Route discovery.
//!
//! A [`RouteSource`] reports the current set of route files and the modules
//! they export. [`RouteRegistry`] is the in-memory source that the module
//! loader (or a test) fills in; [`FsRouteScanner`] walks a routes directory.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use onyx_router::{RouteExports, RouteFile};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::module::RouteModule;

static LOADER_EXPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"export\s+(async\s+)?(function\s*\*?\s*|(const|let|var)\s+)loader\b")
        .expect("static regex")
});
static STATIC_PARAMS_EXPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"export\s+(async\s+)?(function|const|let|var)\s+generateStaticParams\b")
        .expect("static regex")
});

const ROUTE_EXTENSIONS: [&str; 4] = ["tsx", "ts", "jsx", "js"];

/// One discovery pass.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub files: Vec<RouteFile>,
    pub modules: HashMap<String, RouteModule>,
}

#[async_trait]
pub trait RouteSource: Send + Sync {
    /// Directory the routes live in, for diagnostics.
    fn root(&self) -> &str;

    async fn discover(&self) -> anyhow::Result<Discovery>;
}

/// Modules registered by path relative to the routes directory.
#[derive(Debug, Clone)]
pub struct RouteRegistry {
    root: String,
    modules: Arc<RwLock<BTreeMap<String, RouteModule>>>,
}

impl RouteRegistry {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            modules: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub fn with_route(self, path: impl Into<String>, module: RouteModule) -> Self {
        self.insert(path, module);
        self
    }

    pub fn insert(&self, path: impl Into<String>, module: RouteModule) {
        if let Ok(mut modules) = self.modules.write() {
            modules.insert(path.into(), module);
        }
    }

    pub fn remove(&self, path: &str) -> Option<RouteModule> {
        self.modules.write().ok()?.remove(path)
    }

    pub fn get(&self, path: &str) -> Option<RouteModule> {
        self.modules.read().ok()?.get(path).cloned()
    }

    fn snapshot(&self) -> anyhow::Result<BTreeMap<String, RouteModule>> {
        self.modules
            .read()
            .map(|modules| modules.clone())
            .map_err(|_| anyhow::anyhow!("route registry lock poisoned"))
    }
}

#[async_trait]
impl RouteSource for RouteRegistry {
    fn root(&self) -> &str {
        &self.root
    }

    async fn discover(&self) -> anyhow::Result<Discovery> {
        let modules = self.snapshot()?;
        let files = modules
            .iter()
            .map(|(path, module)| RouteFile::new(path.clone()).with_exports(module.exports()))
            .collect();
        Ok(Discovery {
            files,
            modules: modules.into_iter().collect(),
        })
    }
}

/// Best-effort export detection from route source text.
pub fn sniff_exports(source: &str) -> RouteExports {
    RouteExports {
        loader: LOADER_EXPORT.is_match(source),
        generate_static_params: STATIC_PARAMS_EXPORT.is_match(source),
    }
}

/// Walks a routes directory. Exports come from `registry` when it has the
/// module, otherwise they are sniffed from the file text.
#[derive(Debug, Clone)]
pub struct FsRouteScanner {
    root: PathBuf,
    display: String,
    registry: Option<RouteRegistry>,
}

impl FsRouteScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            display: root.display().to_string(),
            root,
            registry: None,
        }
    }

    pub fn with_registry(mut self, registry: RouteRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }
}

pub(crate) fn is_route_source(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if name.ends_with(".d.ts") {
        return false;
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ROUTE_EXTENSIONS.contains(&ext))
}

fn scan(root: &Path) -> anyhow::Result<Vec<(String, RouteExports)>> {
    if !root.is_dir() {
        anyhow::bail!("routes directory {:?} does not exist", root);
    }

    let mut found = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Skipping unreadable entry: {}", err);
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_route_source(entry.path()) {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        let exports = match std::fs::read_to_string(entry.path()) {
            Ok(text) => sniff_exports(&text),
            Err(err) => {
                warn!("Could not read {:?}: {}", entry.path(), err);
                RouteExports::default()
            }
        };
        found.push((relative, exports));
    }
    Ok(found)
}

#[async_trait]
impl RouteSource for FsRouteScanner {
    fn root(&self) -> &str {
        &self.display
    }

    async fn discover(&self) -> anyhow::Result<Discovery> {
        let root = self.root.clone();
        let scanned = tokio::task::spawn_blocking(move || scan(&root)).await??;
        debug!(root = %self.display, files = scanned.len(), "Scanned routes directory");

        let mut discovery = Discovery::default();
        for (path, sniffed) in scanned {
            match self.registry.as_ref().and_then(|r| r.get(&path)) {
                Some(module) => {
                    discovery
                        .files
                        .push(RouteFile::new(path.clone()).with_exports(module.exports()));
                    discovery.modules.insert(path, module);
                }
                None => discovery.files.push(RouteFile::new(path).with_exports(sniffed)),
            }
        }
        Ok(discovery)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{LoaderError, LoaderProps};
    use rstest::rstest;
    use serde_json::Value;

    #[rstest]
    #[case("export async function loader() {}", true, false)]
    #[case("export const loader = async () => ({})", true, false)]
    #[case("export function generateStaticParams() { return [] }", false, true)]
    #[case("export const loaderish = 1", false, false)]
    #[case("// loader\nexport default function Page() {}", false, false)]
    fn sniffs_exports(#[case] text: &str, #[case] loader: bool, #[case] params: bool) {
        let exports = sniff_exports(text);
        assert_eq!(exports.loader, loader);
        assert_eq!(exports.generate_static_params, params);
    }

    #[tokio::test]
    async fn registry_reports_module_exports() {
        let registry = RouteRegistry::new("app")
            .with_route("index.tsx", RouteModule::new())
            .with_route(
                "posts/[id].tsx",
                RouteModule::new().with_loader(|_p: LoaderProps| async {
                    Ok::<_, LoaderError>(Value::Null)
                }),
            );

        let discovery = registry.discover().await.unwrap();
        assert_eq!(discovery.files.len(), 2);
        assert!(discovery.files.iter().any(|f| f.path == "posts/[id].tsx" && f.exports.loader));

        registry.remove("index.tsx");
        assert_eq!(registry.discover().await.unwrap().files.len(), 1);
    }

    #[tokio::test]
    async fn scanner_walks_directory() {
        let root = std::env::temp_dir().join(format!("onyx-scan-{}", std::process::id()));
        std::fs::create_dir_all(root.join("blog")).unwrap();
        std::fs::write(root.join("index.tsx"), "export default function Page() {}").unwrap();
        std::fs::write(
            root.join("blog/[slug].tsx"),
            "export async function loader() { return {} }",
        )
        .unwrap();
        std::fs::write(root.join("env.d.ts"), "declare module 'x'").unwrap();
        std::fs::write(root.join("styles.css"), "body {}").unwrap();

        let discovery = FsRouteScanner::new(&root).discover().await.unwrap();
        let mut paths: Vec<(String, bool)> = discovery
            .files
            .iter()
            .map(|f| (f.path.clone(), f.exports.loader))
            .collect();
        paths.sort();
        assert_eq!(
            paths,
            vec![("blog/[slug].tsx".to_string(), true), ("index.tsx".to_string(), false)]
        );

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[tokio::test]
    async fn scanner_reports_missing_directory() {
        let err = FsRouteScanner::new("/definitely/not/a/routes/dir")
            .discover()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
