use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::config::Config;

/// How files under a path may be created or deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    Direct,
    Brokered,
}

/// Decides whether a path is writable directly or only through the broker.
pub trait AccessPolicy: Send + Sync {
    fn access_mode(&self, path: &Path) -> AccessMode;
}

impl<F> AccessPolicy for F
where
    F: Fn(&Path) -> AccessMode + Send + Sync,
{
    fn access_mode(&self, path: &Path) -> AccessMode {
        self(path)
    }
}

/// Anything under a removable volume (or a configured brokered root) needs the
/// broker; everything else is written directly.
#[derive(Debug, Clone, Default)]
pub struct RemovableStorageAccess {
    brokered_roots: Vec<PathBuf>,
}

impl RemovableStorageAccess {
    pub fn new(brokered_roots: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            brokered_roots: brokered_roots.into_iter().collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut roots: Vec<PathBuf> = config.brokered_roots.iter().map(PathBuf::from).collect();
        if config.detect_removable_storage {
            roots.extend(detect_removable_volumes());
        }
        Self::new(roots)
    }
}

impl AccessPolicy for RemovableStorageAccess {
    fn access_mode(&self, path: &Path) -> AccessMode {
        if self.brokered_roots.iter().any(|root| path.starts_with(root)) {
            AccessMode::Brokered
        } else {
            AccessMode::Direct
        }
    }
}

/// Source of the storage roots a refresh walks.
pub trait StorageLocator: Send + Sync {
    fn storage_roots(&self) -> Vec<PathBuf>;
}

/// Configured roots plus any mounted camera volume.
#[derive(Debug, Clone)]
pub struct SystemStorage {
    configured: Vec<PathBuf>,
    detect_removable: bool,
}

impl SystemStorage {
    pub fn from_config(config: &Config) -> Self {
        Self {
            configured: config.storage_roots.iter().map(PathBuf::from).collect(),
            detect_removable: config.detect_removable_storage,
        }
    }
}

impl StorageLocator for SystemStorage {
    fn storage_roots(&self) -> Vec<PathBuf> {
        let mut roots: BTreeSet<PathBuf> = self.configured.iter().cloned().collect();
        if self.detect_removable {
            roots.extend(detect_removable_volumes());
        }
        roots.into_iter().collect()
    }
}

/// Fixed list of roots, for callers that already know where to look.
#[derive(Debug, Clone, Default)]
pub struct StaticStorage(pub Vec<PathBuf>);

impl StorageLocator for StaticStorage {
    fn storage_roots(&self) -> Vec<PathBuf> {
        self.0.clone()
    }
}

fn has_dcim(volume: &Path) -> bool {
    volume.join("DCIM").is_dir()
}

/// Mounted volumes carrying a DCIM folder (camera cards, phones in storage mode).
pub fn detect_removable_volumes() -> Vec<PathBuf> {
    let mut volumes = Vec::new();

    #[cfg(target_os = "windows")]
    {
        for drive_letter in b'A'..=b'Z' {
            let drive = PathBuf::from(format!("{}:\\", drive_letter as char));
            if has_dcim(&drive) {
                volumes.push(drive);
            }
        }
    }

    #[cfg(target_os = "macos")]
    {
        volumes.extend(volumes_with_dcim(Path::new("/Volumes")));
    }

    #[cfg(target_os = "android")]
    {
        // Anything under /storage other than the emulated internal card
        volumes.extend(
            children(Path::new("/storage"))
                .into_iter()
                .filter(|p| !matches!(p.file_name().and_then(|n| n.to_str()), Some("emulated" | "self"))),
        );
    }

    #[cfg(all(target_os = "linux", not(target_os = "android")))]
    {
        // /media/<user>/<volume> and /mnt/<volume>
        for user_dir in children(Path::new("/media")) {
            volumes.extend(volumes_with_dcim(&user_dir));
        }
        volumes.extend(volumes_with_dcim(Path::new("/mnt")));
    }

    debug!("Detected {} removable volume(s)", volumes.len());
    volumes
}

#[allow(dead_code)]
fn children(base: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(base) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[allow(dead_code)]
fn volumes_with_dcim(base: &Path) -> Vec<PathBuf> {
    children(base).into_iter().filter(|p| has_dcim(p)).collect()
}
