use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::db::WatchList;
use crate::scanner::DirectoryEnumerator;
use crate::storage::StorageLocator;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub roots_scanned: usize,
    pub roots_skipped: usize,
    pub folders_upserted: usize,
    pub upsert_failures: usize,
}

/// Re-publishes every media folder to the watch-list once per device boot.
///
/// Only adds and refreshes entries; folders that vanished are left for the UI
/// to prune when it re-validates them.
#[derive(Clone)]
pub struct BootRefreshScheduler {
    locator: Arc<dyn StorageLocator>,
    enumerator: DirectoryEnumerator,
    watch_list: Arc<Mutex<WatchList>>,
}

impl BootRefreshScheduler {
    pub fn new(
        locator: Arc<dyn StorageLocator>,
        enumerator: DirectoryEnumerator,
        watch_list: Arc<Mutex<WatchList>>,
    ) -> Self {
        Self {
            locator,
            enumerator,
            watch_list,
        }
    }

    /// Boot event hook. Must be called from inside a Tokio runtime; the work
    /// itself runs on the blocking pool so the caller returns immediately.
    /// The handle can be dropped, the refresh carries on.
    pub fn on_boot_completed(&self) -> JoinHandle<RefreshSummary> {
        let scheduler = self.clone();
        tokio::task::spawn_blocking(move || scheduler.refresh())
    }

    /// Synchronous refresh. Never fails: every problem is logged and skipped.
    pub fn refresh(&self) -> RefreshSummary {
        let roots = self.locator.storage_roots();
        info!("Boot refresh over {} storage root(s)", roots.len());

        let mut summary = RefreshSummary::default();
        // Nested or repeated roots report the same folder more than once.
        let mut seen: HashSet<PathBuf> = HashSet::new();
        for root in roots {
            let folders = match self.enumerator.scan_root(&root) {
                Ok(folders) => folders,
                Err(e) => {
                    warn!("Skipping storage root during refresh: {}", e);
                    summary.roots_skipped += 1;
                    continue;
                }
            };
            summary.roots_scanned += 1;

            let watch_list = self.watch_list.lock().unwrap_or_else(PoisonError::into_inner);
            for folder in folders.iter().filter(|f| seen.insert(f.path.clone())) {
                match watch_list.upsert(folder) {
                    Ok(()) => summary.folders_upserted += 1,
                    Err(e) => {
                        error!("Failed to record {}: {}", folder.path.display(), e);
                        summary.upsert_failures += 1;
                    }
                }
            }
        }

        info!(
            "Boot refresh done: {} root(s) scanned, {} skipped, {} folder(s) recorded",
            summary.roots_scanned, summary.roots_skipped, summary.folders_upserted
        );
        summary
    }
}
