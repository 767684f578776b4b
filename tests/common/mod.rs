#![allow(dead_code)]

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use gallery_pipeline::broker::{BrokerError, DocumentHandle, GrantToken, PermissionBroker};
use gallery_pipeline::media_index::{IndexError, MediaIndex};

pub fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    File::create(path).unwrap();
}

/// Broker that performs the file operations itself, like the real document
/// provider would on a granted tree.
#[derive(Default)]
pub struct FakeBroker {
    pub created: AtomicUsize,
    pub deleted: AtomicUsize,
    deny: bool,
    delay: Option<Duration>,
    stall_after_create: Option<Duration>,
    stall_after_delete: Option<Duration>,
}

impl FakeBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn denying() -> Self {
        Self {
            deny: true,
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Creates the document, then answers only after `stall`.
    pub fn late_create(stall: Duration) -> Self {
        Self {
            stall_after_create: Some(stall),
            ..Self::default()
        }
    }

    /// Deletes the document, then answers only after `stall`.
    pub fn late_delete(stall: Duration) -> Self {
        Self {
            stall_after_delete: Some(stall),
            ..Self::default()
        }
    }

    async fn wait(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl PermissionBroker for FakeBroker {
    async fn create_document(
        &self,
        grant: &GrantToken,
        parent: &Path,
        name: &str,
    ) -> Result<DocumentHandle, BrokerError> {
        self.wait().await;
        let path = parent.join(name);
        if self.deny {
            return Err(BrokerError::PermissionDenied(path));
        }
        File::create(&path).map_err(|e| BrokerError::Unavailable(e.to_string()))?;
        self.created.fetch_add(1, Ordering::SeqCst);
        if let Some(stall) = self.stall_after_create {
            tokio::time::sleep(stall).await;
        }
        Ok(DocumentHandle {
            grant: grant.clone(),
            path,
        })
    }

    async fn delete_document(&self, handle: &DocumentHandle) -> Result<(), BrokerError> {
        self.wait().await;
        if self.deny {
            return Err(BrokerError::PermissionDenied(handle.path.clone()));
        }
        fs::remove_file(&handle.path).map_err(|e| BrokerError::Unavailable(e.to_string()))?;
        self.deleted.fetch_add(1, Ordering::SeqCst);
        if let Some(stall) = self.stall_after_delete {
            tokio::time::sleep(stall).await;
        }
        Ok(())
    }

    async fn find_document(
        &self,
        grant: &GrantToken,
        path: &Path,
    ) -> Result<Option<DocumentHandle>, BrokerError> {
        if self.deny {
            return Err(BrokerError::PermissionDenied(path.to_path_buf()));
        }
        Ok(path.exists().then(|| DocumentHandle {
            grant: grant.clone(),
            path: path.to_path_buf(),
        }))
    }
}

/// Media index that remembers every re-index request.
#[derive(Default)]
pub struct RecordingIndex {
    requests: Mutex<Vec<PathBuf>>,
    fail: bool,
    delay: Option<Duration>,
}

impl RecordingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<PathBuf> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaIndex for RecordingIndex {
    async fn reindex(&self, path: &Path) -> Result<(), IndexError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.requests.lock().unwrap().push(path.to_path_buf());
        if self.fail {
            return Err(IndexError::Rejected {
                path: path.to_path_buf(),
                reason: "index offline".into(),
            });
        }
        Ok(())
    }
}
