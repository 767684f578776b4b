use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use crate::broker::{BrokerError, GrantStore, GrantToken, PermissionBroker};
use crate::error::ToggleError;
use crate::media_index::MediaIndex;
use crate::models::{marker_path, NOMEDIA};
use crate::storage::{AccessMode, AccessPolicy};

const DEFAULT_BROKER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleOutcome {
    /// The marker was created or removed and the index was told.
    Applied,
    /// The folder was already in the requested state.
    Unchanged,
}

/// One async mutex per folder path. An entry lives only while some toggle
/// holds or waits for it.
#[derive(Default)]
struct PathLocks {
    locks: Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>,
}

impl PathLocks {
    async fn lock(&self, path: &Path) -> PathGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(path.to_path_buf()).or_default().clone()
        };
        PathGuard {
            locks: self,
            path: path.to_path_buf(),
            guard: Some(lock.lock_owned().await),
        }
    }

    fn release(&self, path: &Path) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.get(path).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(path);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

struct PathGuard<'a> {
    locks: &'a PathLocks,
    path: PathBuf,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        // The owned guard holds a clone of the Arc; drop it before counting.
        self.guard.take();
        self.locks.release(&self.path);
    }
}

/// Hides folders from the media index by adding a `.nomedia` marker, and
/// shows them again by removing it.
///
/// Toggles on the same folder run one at a time; the lock is held across the
/// marker change and the re-index that follows it.
pub struct VisibilityToggler {
    access: Arc<dyn AccessPolicy>,
    broker: Arc<dyn PermissionBroker>,
    index: Arc<dyn MediaIndex>,
    grants: RwLock<GrantStore>,
    broker_timeout: Duration,
    locks: PathLocks,
}

impl VisibilityToggler {
    pub fn new(
        access: Arc<dyn AccessPolicy>,
        broker: Arc<dyn PermissionBroker>,
        index: Arc<dyn MediaIndex>,
        grants: GrantStore,
    ) -> Self {
        Self {
            access,
            broker,
            index,
            grants: RwLock::new(grants),
            broker_timeout: DEFAULT_BROKER_TIMEOUT,
            locks: PathLocks::default(),
        }
    }

    pub fn with_broker_timeout(mut self, timeout: Duration) -> Self {
        self.broker_timeout = timeout;
        self
    }

    /// Registers a grant obtained out of band.
    pub fn add_grant(&self, tree: impl Into<PathBuf>, token: GrantToken) {
        self.grants
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tree, token);
    }

    /// Reads the marker file; there is no other record of exclusion.
    pub fn is_excluded(&self, folder: &Path) -> bool {
        marker_path(folder).is_file()
    }

    pub async fn exclude(&self, folder: &Path) -> Result<ToggleOutcome, ToggleError> {
        let _guard = self.locks.lock(folder).await;
        let marker = marker_path(folder);

        if marker_exists(&marker).await {
            debug!("{} is already excluded", folder.display());
            return Ok(ToggleOutcome::Unchanged);
        }

        let mode = self.access.access_mode(folder);
        if let Err(e) = self.create_marker(folder, mode).await {
            // A broker that answers late may still have created the document.
            if matches!(e, ToggleError::BrokerTimeout(_)) && marker_exists(&marker).await {
                warn!("Broker timed out but marker landed in {}, removing it", folder.display());
                if let Err(rollback) = self.delete_marker(folder, mode).await {
                    error!("Could not roll back marker in {}: {}", folder.display(), rollback);
                }
            }
            return Err(e);
        }

        if let Err(e) = self.index.reindex(&marker).await {
            warn!("Re-index failed for {}, removing marker: {}", folder.display(), e);
            if let Err(rollback) = self.delete_marker(folder, mode).await {
                error!("Could not roll back marker in {}: {}", folder.display(), rollback);
            }
            return Err(e.into());
        }

        info!("Excluded {} from the media index ({:?})", folder.display(), mode);
        Ok(ToggleOutcome::Applied)
    }

    pub async fn include(&self, folder: &Path) -> Result<ToggleOutcome, ToggleError> {
        let _guard = self.locks.lock(folder).await;
        let marker = marker_path(folder);

        if !marker_exists(&marker).await {
            debug!("{} is already included", folder.display());
            return Ok(ToggleOutcome::Unchanged);
        }

        let mode = self.access.access_mode(folder);
        if let Err(e) = self.delete_marker(folder, mode).await {
            if matches!(e, ToggleError::BrokerTimeout(_)) && !marker_exists(&marker).await {
                warn!("Broker timed out but marker was removed from {}, restoring it", folder.display());
                if let Err(rollback) = self.create_marker(folder, mode).await {
                    error!("Could not restore marker in {}: {}", folder.display(), rollback);
                }
            }
            return Err(e);
        }

        let reindexed = match self.index.reindex(&marker).await {
            Ok(()) => self.index.reindex(folder).await,
            Err(e) => Err(e),
        };
        if let Err(e) = reindexed {
            warn!("Re-index failed for {}, restoring marker: {}", folder.display(), e);
            if let Err(rollback) = self.create_marker(folder, mode).await {
                error!("Could not restore marker in {}: {}", folder.display(), rollback);
            }
            return Err(e.into());
        }

        info!("Included {} in the media index ({:?})", folder.display(), mode);
        Ok(ToggleOutcome::Applied)
    }

    async fn create_marker(&self, folder: &Path, mode: AccessMode) -> Result<(), ToggleError> {
        match mode {
            AccessMode::Direct => {
                let marker = marker_path(folder);
                match tokio::fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&marker)
                    .await
                {
                    Ok(_) => Ok(()),
                    Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
                    Err(source) => Err(ToggleError::Io {
                        path: marker,
                        source,
                    }),
                }
            }
            AccessMode::Brokered => {
                let grant = self.grant_for(folder)?;
                self.bounded(self.broker.create_document(&grant, folder, NOMEDIA))
                    .await?;
                Ok(())
            }
        }
    }

    async fn delete_marker(&self, folder: &Path, mode: AccessMode) -> Result<(), ToggleError> {
        let marker = marker_path(folder);
        match mode {
            AccessMode::Direct => match tokio::fs::remove_file(&marker).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(source) => Err(ToggleError::Io {
                    path: marker,
                    source,
                }),
            },
            AccessMode::Brokered => {
                let grant = self.grant_for(folder)?;
                match self.bounded(self.broker.find_document(&grant, &marker)).await? {
                    Some(handle) => self.bounded(self.broker.delete_document(&handle)).await,
                    None => Ok(()),
                }
            }
        }
    }

    fn grant_for(&self, folder: &Path) -> Result<GrantToken, ToggleError> {
        self.grants
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .grant_for(folder)
            .cloned()
            .ok_or_else(|| ToggleError::PermissionRequired {
                path: folder.to_path_buf(),
            })
    }

    async fn bounded<T>(
        &self,
        request: impl Future<Output = Result<T, BrokerError>>,
    ) -> Result<T, ToggleError> {
        match tokio::time::timeout(self.broker_timeout, request).await {
            Ok(result) => result.map_err(ToggleError::from),
            Err(_) => Err(ToggleError::BrokerTimeout(self.broker_timeout)),
        }
    }
}

async fn marker_exists(marker: &Path) -> bool {
    tokio::fs::metadata(marker)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::UnavailableBroker;
    use crate::media_index::LoggingIndex;

    fn direct_toggler() -> VisibilityToggler {
        VisibilityToggler::new(
            Arc::new(|_: &Path| AccessMode::Direct),
            Arc::new(UnavailableBroker),
            Arc::new(LoggingIndex),
            GrantStore::new(),
        )
    }

    #[tokio::test]
    async fn exclude_then_include_restores_state() {
        let dir = tempfile::tempdir().unwrap();
        let toggler = direct_toggler();

        assert_eq!(toggler.exclude(dir.path()).await.unwrap(), ToggleOutcome::Applied);
        assert!(toggler.is_excluded(dir.path()));
        assert_eq!(std::fs::metadata(marker_path(dir.path())).unwrap().len(), 0);

        assert_eq!(toggler.include(dir.path()).await.unwrap(), ToggleOutcome::Applied);
        assert!(!toggler.is_excluded(dir.path()));
    }

    #[tokio::test]
    async fn toggles_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let toggler = direct_toggler();

        assert_eq!(toggler.include(dir.path()).await.unwrap(), ToggleOutcome::Unchanged);
        toggler.exclude(dir.path()).await.unwrap();
        assert_eq!(toggler.exclude(dir.path()).await.unwrap(), ToggleOutcome::Unchanged);
        assert!(toggler.is_excluded(dir.path()));
    }

    #[tokio::test]
    async fn lock_entries_are_released_after_a_toggle() {
        let dir = tempfile::tempdir().unwrap();
        let toggler = direct_toggler();

        toggler.exclude(dir.path()).await.unwrap();
        assert_eq!(toggler.locks.len(), 0);
        toggler.include(dir.path()).await.unwrap();
        toggler.include(dir.path()).await.unwrap();
        assert_eq!(toggler.locks.len(), 0);
    }

    #[tokio::test]
    async fn held_lock_keeps_its_entry() {
        let dir = tempfile::tempdir().unwrap();
        let toggler = direct_toggler();

        let guard = toggler.locks.lock(dir.path()).await;
        assert_eq!(toggler.locks.len(), 1);
        drop(guard);
        assert_eq!(toggler.locks.len(), 0);
    }

    #[tokio::test]
    async fn missing_folder_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("gone");

        let err = direct_toggler().exclude(&gone).await.unwrap_err();
        assert!(matches!(err, ToggleError::Io { .. }));
    }

    #[tokio::test]
    async fn brokered_path_without_grant_needs_permission() {
        let dir = tempfile::tempdir().unwrap();
        let toggler = VisibilityToggler::new(
            Arc::new(|_: &Path| AccessMode::Brokered),
            Arc::new(UnavailableBroker),
            Arc::new(LoggingIndex),
            GrantStore::new(),
        );

        let err = toggler.exclude(dir.path()).await.unwrap_err();
        assert!(matches!(err, ToggleError::PermissionRequired { .. }));
        assert!(!toggler.is_excluded(dir.path()));
    }
}
