use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::config::Config;
use crate::error::ScanError;
use crate::models::{is_hidden_name, MediaFolder, NOMEDIA};
use crate::policy::classify;

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Walk dot-folders and report marker-bearing folders instead of dropping them.
    pub show_hidden: bool,
    /// Folders the user excluded; skipped together with everything below them.
    pub excluded_paths: Vec<PathBuf>,
}

impl ScanOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            show_hidden: config.show_hidden_folders,
            excluded_paths: config.excluded_paths(),
        }
    }
}

/// Finds the folders under a set of storage roots that hold displayable media.
///
/// Read-only; it may run while a visibility toggle is in flight and will then
/// report whichever marker state it happened to read.
#[derive(Debug, Clone, Default)]
pub struct DirectoryEnumerator {
    options: ScanOptions,
}

impl DirectoryEnumerator {
    pub fn new(options: ScanOptions) -> Self {
        Self { options }
    }

    /// Best-effort scan of every root. Roots that cannot be read contribute
    /// nothing; an empty or entirely missing root set yields an empty set.
    pub fn scan<I, P>(&self, roots: I) -> BTreeSet<MediaFolder>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let roots: Vec<PathBuf> = roots
            .into_iter()
            .map(|r| r.as_ref().to_path_buf())
            .collect();

        let folders: BTreeSet<MediaFolder> = roots
            .par_iter()
            .filter_map(|root| match self.scan_root(root) {
                Ok(folders) => Some(folders),
                Err(e) => {
                    debug!("Skipping storage root: {}", e);
                    None
                }
            })
            .flat_map_iter(|folders| folders)
            .collect();

        info!(
            "Scanned {} storage root(s), found {} media folder(s)",
            roots.len(),
            folders.len()
        );
        folders
    }

    /// Scans one root. Only a root that cannot be opened at all is an error;
    /// unreadable folders below it are skipped.
    pub fn scan_root(&self, root: &Path) -> Result<Vec<MediaFolder>, ScanError> {
        let metadata = fs::metadata(root).map_err(|source| ScanError::InaccessibleStorage {
            path: root.to_path_buf(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(ScanError::InaccessibleStorage {
                path: root.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a directory"),
            });
        }

        let mut folders = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| self.should_descend(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            if let Some(folder) = self.evaluate_folder(entry.path()) {
                folders.push(folder);
            }
        }

        debug!("{}: {} media folder(s)", root.display(), folders.len());
        Ok(folders)
    }

    fn should_descend(&self, entry: &DirEntry) -> bool {
        if !entry.file_type().is_dir() {
            return true;
        }
        if self.options.excluded_paths.iter().any(|p| p == entry.path()) {
            return false;
        }
        if entry.depth() > 0 && !self.options.show_hidden {
            let hidden = entry
                .file_name()
                .to_str()
                .map(is_hidden_name)
                .unwrap_or(false);
            return !hidden;
        }
        true
    }

    /// Looks at the immediate files of one folder.
    fn evaluate_folder(&self, dir: &Path) -> Option<MediaFolder> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Skipping unreadable folder {}: {}", dir.display(), e);
                return None;
            }
        };

        let mut has_media = false;
        let mut has_marker = false;
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if entry.file_name().to_str() == Some(NOMEDIA) {
                has_marker = true;
            } else if !has_media && classify(&path).is_supported() {
                has_media = true;
            }
        }

        if !has_media || (has_marker && !self.options.show_hidden) {
            return None;
        }
        Some(MediaFolder::new(dir.to_path_buf(), has_marker))
    }
}
