use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::broker::BrokerError;
use crate::media_index::IndexError;

/// A storage root that could not be walked at all.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("storage at {path} is inaccessible: {source}")]
    InaccessibleStorage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a visibility toggle was not applied.
///
/// Whatever the variant, the marker file is left as it was before the call.
#[derive(Error, Debug)]
pub enum ToggleError {
    #[error("{path} needs a storage access grant before it can be changed")]
    PermissionRequired { path: PathBuf },
    #[error("permission broker did not answer within {0:?}")]
    BrokerTimeout(Duration),
    #[error("permission broker refused: {0}")]
    BrokerDenied(#[from] BrokerError),
    #[error("media index could not be updated: {0}")]
    IndexFailed(#[from] IndexError),
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("work queue is shut down")]
    Closed,
    #[error("worker dropped the job before replying")]
    Dropped,
    #[error(transparent)]
    Toggle(#[from] ToggleError),
}
