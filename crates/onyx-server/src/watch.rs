use anyhow::Result;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::source::is_route_source;
use crate::table::RouteTable;

/// Kind of structural change to the route tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Added,
    Removed,
    Renamed,
}

/// A route file that appeared, disappeared or moved
#[derive(Debug, Clone, PartialEq)]
pub struct RouteChange {
    pub path: PathBuf,
    pub change_type: ChangeType,
}

/// Maps a notify event kind to a route-tree change. Content edits do not
/// change the route set and are ignored.
fn change_type(kind: &EventKind) -> Option<ChangeType> {
    match kind {
        EventKind::Create(_) => Some(ChangeType::Added),
        EventKind::Remove(_) => Some(ChangeType::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(ChangeType::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(ChangeType::Added),
        EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeType::Renamed),
        _ => None,
    }
}

/// Watches the routes directory and broadcasts route-set changes
pub struct RouteWatcher {
    tx: broadcast::Sender<RouteChange>,
    _watcher: notify::RecommendedWatcher,
}

impl RouteWatcher {
    pub fn new(root: &Path) -> Result<Self> {
        let (tx, _) = broadcast::channel(100);
        let tx_clone = tx.clone();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    let Some(change_type) = change_type(&event.kind) else {
                        return;
                    };
                    for path in event.paths {
                        if !is_route_source(&path) {
                            continue;
                        }

                        info!(path = ?path, ?change_type, "Route file changed");

                        // No receivers is fine
                        let _ = tx_clone.send(RouteChange {
                            path,
                            change_type,
                        });
                    }
                }
                Err(e) => error!("Watch error: {:?}", e),
            }
        })?;

        if root.exists() {
            watcher.watch(root, RecursiveMode::Recursive)?;
            info!("Watching: {:?}", root);
        } else {
            warn!("Routes directory does not exist: {:?}", root);
        }

        Ok(Self {
            tx,
            _watcher: watcher,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RouteChange> {
        self.tx.subscribe()
    }

    /// Rebuilds `table` on every change. Bursts collapse into the rebuild
    /// already in flight.
    pub fn spawn_rebuilder(&self, table: RouteTable) -> JoinHandle<()> {
        spawn_rebuilder(self.subscribe(), table)
    }
}

/// Drives `table` rebuilds from a change stream until the sender closes.
pub fn spawn_rebuilder(
    mut changes: broadcast::Receiver<RouteChange>,
    table: RouteTable,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(change) => {
                    if let Err(err) = table.rebuild().await {
                        warn!(path = ?change.path, error = %err, "Rebuild failed, keeping previous routes");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Route watcher lagged");
                    if let Err(err) = table.rebuild().await {
                        warn!(error = %err, "Rebuild failed, keeping previous routes");
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};
    use rstest::rstest;

    #[rstest]
    #[case(EventKind::Create(CreateKind::File), Some(ChangeType::Added))]
    #[case(EventKind::Remove(RemoveKind::File), Some(ChangeType::Removed))]
    #[case(EventKind::Modify(ModifyKind::Name(RenameMode::Both)), Some(ChangeType::Renamed))]
    #[case(EventKind::Modify(ModifyKind::Data(DataChange::Content)), None)]
    fn only_structural_events_count(#[case] kind: EventKind, #[case] expected: Option<ChangeType>) {
        assert_eq!(change_type(&kind), expected);
    }
}
