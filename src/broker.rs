//! Permission broker contract.
//!
//! Some storage locations refuse direct file creation. Writes there go through
//! a document broker, scoped to an access grant the user handed out earlier.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;

/// Opaque token proving a storage tree was granted to us.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GrantToken(pub String);

/// Broker-side reference to a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentHandle {
    pub grant: GrantToken,
    pub path: PathBuf,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("broker denied access to {0}")]
    PermissionDenied(PathBuf),
    #[error("broker unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PermissionBroker: Send + Sync {
    async fn create_document(
        &self,
        grant: &GrantToken,
        parent: &Path,
        name: &str,
    ) -> Result<DocumentHandle, BrokerError>;

    async fn delete_document(&self, handle: &DocumentHandle) -> Result<(), BrokerError>;

    /// Resolves an existing document under a grant. `None` if it is not there.
    async fn find_document(
        &self,
        grant: &GrantToken,
        path: &Path,
    ) -> Result<Option<DocumentHandle>, BrokerError>;
}

/// Broker for hosts without one: every request is refused.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableBroker;

#[async_trait]
impl PermissionBroker for UnavailableBroker {
    async fn create_document(
        &self,
        _grant: &GrantToken,
        parent: &Path,
        _name: &str,
    ) -> Result<DocumentHandle, BrokerError> {
        Err(BrokerError::Unavailable(format!(
            "no document broker for {}",
            parent.display()
        )))
    }

    async fn delete_document(&self, handle: &DocumentHandle) -> Result<(), BrokerError> {
        Err(BrokerError::Unavailable(format!(
            "no document broker for {}",
            handle.path.display()
        )))
    }

    async fn find_document(
        &self,
        _grant: &GrantToken,
        path: &Path,
    ) -> Result<Option<DocumentHandle>, BrokerError> {
        Err(BrokerError::Unavailable(format!(
            "no document broker for {}",
            path.display()
        )))
    }
}

/// Grants keyed by the storage tree they cover.
#[derive(Debug, Clone, Default)]
pub struct GrantStore {
    grants: BTreeMap<PathBuf, GrantToken>,
}

impl GrantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Self {
        let grants = config
            .access_grants
            .iter()
            .map(|(tree, token)| (PathBuf::from(tree), GrantToken(token.clone())))
            .collect();
        Self { grants }
    }

    pub fn insert(&mut self, tree: impl Into<PathBuf>, token: GrantToken) {
        self.grants.insert(tree.into(), token);
    }

    /// The grant of the deepest tree containing `path`.
    pub fn grant_for(&self, path: &Path) -> Option<&GrantToken> {
        self.grants
            .iter()
            .filter(|(tree, _)| path.starts_with(tree))
            .max_by_key(|(tree, _)| tree.components().count())
            .map(|(_, token)| token)
    }
}
