//! The live route table.
//!
//! Rebuilds are wholesale: discover, build a manifest, compile it, then swap
//! the snapshot in one step. At most one rebuild runs at a time; callers that
//! arrive while one is in flight await that same rebuild.

use futures::future::{BoxFuture, FutureExt, Shared};
use onyx_router::{ManifestBuilder, RouteKind, RouteMatcher, RoutesManifest};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info};

use crate::error::DispatchError;
use crate::module::RouteModule;
use crate::source::RouteSource;

/// A consistent view of manifest, matcher and modules.
#[derive(Debug)]
pub struct Snapshot {
    pub version: u64,
    pub manifest: RoutesManifest,
    pub matcher: RouteMatcher,
    pub modules: HashMap<String, RouteModule>,
}

impl Snapshot {
    pub fn module(&self, file: &str) -> Option<&RouteModule> {
        self.modules.get(file)
    }
}

type RebuildResult = Result<Arc<Snapshot>, Arc<DispatchError>>;
type InFlight = Shared<BoxFuture<'static, RebuildResult>>;

struct TableInner {
    source: Arc<dyn RouteSource>,
    default_loader_mode: RouteKind,
    current: RwLock<Arc<Snapshot>>,
    in_flight: Mutex<Option<InFlight>>,
}

/// Shared handle to the route table. Clones see the same snapshot.
#[derive(Clone)]
pub struct RouteTable {
    inner: Arc<TableInner>,
}

async fn build_snapshot(
    source: &dyn RouteSource,
    default_loader_mode: RouteKind,
    version: u64,
) -> Result<Snapshot, DispatchError> {
    let discovery = source
        .discover()
        .await
        .map_err(|err| DispatchError::Rebuild(format!("{:#}", err)))?;

    let manifest = ManifestBuilder::new(source.root())
        .with_default_loader_mode(default_loader_mode)
        .with_files(discovery.files)
        .build()?;
    let matcher = RouteMatcher::new(&manifest)?;

    Ok(Snapshot {
        version,
        manifest,
        matcher,
        modules: discovery.modules,
    })
}

impl RouteTable {
    /// Builds the first snapshot. Failing here is fatal for startup.
    pub async fn load(
        source: Arc<dyn RouteSource>,
        default_loader_mode: RouteKind,
    ) -> Result<Self, DispatchError> {
        let snapshot = build_snapshot(source.as_ref(), default_loader_mode, 1).await?;
        info!(
            routes = snapshot.manifest.route_count(),
            "Route table ready"
        );

        Ok(Self {
            inner: Arc::new(TableInner {
                source,
                default_loader_mode,
                current: RwLock::new(Arc::new(snapshot)),
                in_flight: Mutex::new(None),
            }),
        })
    }

    /// Current snapshot. Waits for an in-flight rebuild first, so a request
    /// never sees a table that is about to be replaced.
    pub async fn current(&self) -> Arc<Snapshot> {
        let pending = self.inner.in_flight.lock().await.clone();
        if let Some(rebuild) = pending {
            if let Ok(snapshot) = rebuild.await {
                return snapshot;
            }
        }
        self.inner.current.read().await.clone()
    }

    /// Rebuilds from the source, or joins the rebuild already running.
    ///
    /// A failed rebuild keeps the previous snapshot in place.
    pub async fn rebuild(&self) -> RebuildResult {
        let rebuild = {
            let mut slot = self.inner.in_flight.lock().await;
            match slot.as_ref() {
                Some(existing) => existing.clone(),
                None => {
                    let fresh = Self::start_rebuild(self.inner.clone());
                    *slot = Some(fresh.clone());
                    fresh
                }
            }
        };
        rebuild.await
    }

    fn start_rebuild(inner: Arc<TableInner>) -> InFlight {
        async move {
            let version = inner.current.read().await.version + 1;
            let result = build_snapshot(inner.source.as_ref(), inner.default_loader_mode, version)
                .await
                .map(Arc::new)
                .map_err(Arc::new);

            match &result {
                Ok(snapshot) => {
                    *inner.current.write().await = snapshot.clone();
                    info!(
                        version,
                        routes = snapshot.manifest.route_count(),
                        "Route table rebuilt"
                    );
                }
                Err(err) => error!("Route rebuild failed, keeping previous table: {}", err),
            }

            *inner.in_flight.lock().await = None;
            result
        }
        .boxed()
        .shared()
    }
}
