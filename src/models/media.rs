use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// Reserved name of the sentinel file that hides a folder from the media index.
pub const NOMEDIA: &str = ".nomedia";

/// A folder that currently holds displayable media.
///
/// Identity is the path alone: two values with the same path are the same
/// folder, whatever flags they carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFolder {
    pub path: PathBuf,
    pub has_qualifying_media: bool,
    /// Marker presence as observed when the folder was scanned.
    pub is_excluded_from_index: bool,
}

impl MediaFolder {
    pub fn new(path: PathBuf, is_excluded_from_index: bool) -> Self {
        Self {
            path,
            has_qualifying_media: true,
            is_excluded_from_index,
        }
    }

    pub fn marker_path(&self) -> PathBuf {
        marker_path(&self.path)
    }

    /// Re-reads the marker file instead of trusting the scan snapshot.
    pub fn is_excluded_now(&self) -> bool {
        has_marker(&self.path)
    }
}

impl PartialEq for MediaFolder {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for MediaFolder {}

impl Hash for MediaFolder {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl PartialOrd for MediaFolder {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MediaFolder {
    fn cmp(&self, other: &Self) -> Ordering {
        self.path.cmp(&other.path)
    }
}

pub fn marker_path(folder: &Path) -> PathBuf {
    folder.join(NOMEDIA)
}

pub fn has_marker(folder: &Path) -> bool {
    marker_path(folder).is_file()
}

/// Display variant a file is loaded as.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Variant {
    /// Still image. `opaque` is set for formats that never carry alpha.
    Image { opaque: bool },
    AnimatedImage,
    Video,
    Unsupported,
}

impl Variant {
    pub fn is_supported(&self) -> bool {
        !matches!(self, Variant::Unsupported)
    }
}

/// One display call for one file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoadRequest {
    pub path: PathBuf,
    pub target_variant: Variant,
}

impl LoadRequest {
    /// Returns `None` when the file is not something the gallery can display.
    pub fn for_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let target_variant = crate::policy::classify(&path);
        if !target_variant.is_supported() {
            return None;
        }
        Some(Self {
            path,
            target_variant,
        })
    }
}

pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "webp", "bmp", "heic", "heif", "tif", "tiff", "dng", "svg",
];
pub const ANIMATED_IMAGE_EXTENSIONS: &[&str] = &["gif"];
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "avi", "mkv", "webm", "m4v", "3gp", "mpg", "mpeg", "wmv", "flv",
];

/// Still formats decoded without an alpha channel.
pub const OPAQUE_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "bmp", "heic", "heif", "dng"];

/// Extension-only classification. `None` means the extension says nothing.
pub fn variant_from_extension(path: &Path) -> Option<Variant> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    let ext = ext.as_str();

    if IMAGE_EXTENSIONS.contains(&ext) {
        Some(Variant::Image {
            opaque: OPAQUE_IMAGE_EXTENSIONS.contains(&ext),
        })
    } else if ANIMATED_IMAGE_EXTENSIONS.contains(&ext) {
        Some(Variant::AnimatedImage)
    } else if VIDEO_EXTENSIONS.contains(&ext) {
        Some(Variant::Video)
    } else {
        None
    }
}

pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn folder_identity_is_the_path() {
        let a = MediaFolder::new(PathBuf::from("/storage/DCIM/Camera"), false);
        let b = MediaFolder::new(PathBuf::from("/storage/DCIM/Camera"), true);
        assert_eq!(a, b);

        let set: BTreeSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn extensions_are_case_insensitive() {
        assert_eq!(
            variant_from_extension(Path::new("IMG_0001.JPG")),
            Some(Variant::Image { opaque: true })
        );
        assert_eq!(
            variant_from_extension(Path::new("shot.Png")),
            Some(Variant::Image { opaque: false })
        );
        assert_eq!(
            variant_from_extension(Path::new("clip.MP4")),
            Some(Variant::Video)
        );
        assert_eq!(
            variant_from_extension(Path::new("loop.gif")),
            Some(Variant::AnimatedImage)
        );
        assert_eq!(variant_from_extension(Path::new("notes.txt")), None);
        assert_eq!(variant_from_extension(Path::new("README")), None);
    }

    #[test]
    fn marker_file_is_not_media() {
        assert_eq!(variant_from_extension(Path::new(NOMEDIA)), None);
    }
}
