//! External media index contract.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("re-index of {path} failed: {reason}")]
    Rejected { path: PathBuf, reason: String },
}

/// The system's own index of media files. It mirrors the filesystem lazily, so
/// every marker change is followed by a re-index of the touched paths.
#[async_trait]
pub trait MediaIndex: Send + Sync {
    /// Resolves once the index has processed `path`.
    async fn reindex(&self, path: &Path) -> Result<(), IndexError>;
}

/// Index for hosts without a system media index; it only records the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingIndex;

#[async_trait]
impl MediaIndex for LoggingIndex {
    async fn reindex(&self, path: &Path) -> Result<(), IndexError> {
        info!("Re-index requested: {}", path.display());
        Ok(())
    }
}
