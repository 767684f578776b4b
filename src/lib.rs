//! Media discovery and loading pipeline for the gallery.
//!
//! Finds the folders that hold photos and videos, keeps the watch-list fresh
//! after a boot, hides or shows folders through `.nomedia` markers and picks a
//! cache/decode policy for each file shown.

pub mod boot;
pub mod broker;
pub mod config;
pub mod db;
pub mod error;
pub mod media_index;
pub mod models;
pub mod policy;
pub mod queue;
pub mod scanner;
pub mod storage;
pub mod utils;
pub mod visibility;

pub use boot::{BootRefreshScheduler, RefreshSummary};
pub use broker::{BrokerError, DocumentHandle, GrantStore, GrantToken, PermissionBroker};
pub use config::Config;
pub use db::WatchList;
pub use error::{QueueError, ScanError, ToggleError};
pub use media_index::{IndexError, MediaIndex};
pub use models::{CacheBy, CachingPolicy, LoadRequest, MediaFolder, PixelFormat, Variant, NOMEDIA};
pub use policy::{classify, policy_for, MediaPolicySelector};
pub use queue::{Job, Pipeline, WorkQueue};
pub use scanner::{DirectoryEnumerator, ScanOptions};
pub use storage::{AccessMode, AccessPolicy, StorageLocator};
pub use visibility::{ToggleOutcome, VisibilityToggler};
