//! Per-file decode and cache policy.
//!
//! Still images keep the fully decoded result because redisplaying it is
//! free. Animated images keep the source bytes since a decoded frame set is
//! much larger than the file it came from.

use std::path::Path;

use crate::config::Config;
use crate::models::{variant_from_extension, CacheBy, CachingPolicy, LoadRequest, PixelFormat, Variant};
use crate::utils::sniff_variant;

/// Classifies a path by extension, falling back to the file signature.
pub fn classify(path: &Path) -> Variant {
    match variant_from_extension(path) {
        Some(variant) => variant,
        None if path.extension().is_none() => sniff_variant(path),
        None => Variant::Unsupported,
    }
}

/// Returns `None` for `Unsupported`, which callers must branch on first.
pub fn policy_for(variant: Variant, animate_animated_images: bool) -> Option<CachingPolicy> {
    let policy = match variant {
        Variant::Image { opaque: true } => CachingPolicy {
            cache_by: CacheBy::FullResult,
            pixel_format: PixelFormat::PreferOpaque,
            animate: false,
            cross_fade: true,
        },
        Variant::Image { opaque: false } => CachingPolicy {
            cache_by: CacheBy::FullResult,
            pixel_format: PixelFormat::PreferAlphaCapable,
            animate: false,
            cross_fade: false,
        },
        Variant::Video => CachingPolicy {
            cache_by: CacheBy::FullResult,
            pixel_format: PixelFormat::PreferAlphaCapable,
            animate: false,
            cross_fade: true,
        },
        Variant::AnimatedImage => CachingPolicy {
            cache_by: CacheBy::SourceBytes,
            pixel_format: PixelFormat::PreferAlphaCapable,
            animate: animate_animated_images,
            cross_fade: animate_animated_images,
        },
        Variant::Unsupported => return None,
    };
    Some(policy)
}

/// Binds the user's animation preference to the pure selection functions.
#[derive(Debug, Clone, Copy)]
pub struct MediaPolicySelector {
    pub animate_animated_images: bool,
}

impl MediaPolicySelector {
    pub fn new(animate_animated_images: bool) -> Self {
        Self {
            animate_animated_images,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.animate_gifs)
    }

    pub fn classify(&self, path: &Path) -> Variant {
        classify(path)
    }

    pub fn policy_for(&self, variant: Variant) -> Option<CachingPolicy> {
        policy_for(variant, self.animate_animated_images)
    }

    pub fn policy_for_request(&self, request: &LoadRequest) -> Option<CachingPolicy> {
        self.policy_for(request.target_variant)
    }

    /// Classification and policy in one step; `None` for unsupported files.
    pub fn select(&self, path: &Path) -> Option<(Variant, CachingPolicy)> {
        let variant = classify(path);
        self.policy_for(variant).map(|policy| (variant, policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn opaque_still_prefers_opaque_pixels() {
        let policy = policy_for(classify(Path::new("/sdcard/DCIM/a.jpg")), true).unwrap();
        assert_eq!(policy.cache_by, CacheBy::FullResult);
        assert_eq!(policy.pixel_format, PixelFormat::PreferOpaque);
        assert!(!policy.animate);
    }

    #[test]
    fn alpha_still_and_video_prefer_alpha() {
        for path in ["/sdcard/shot.png", "/sdcard/clip.mp4"] {
            let policy = policy_for(classify(Path::new(path)), true).unwrap();
            assert_eq!(policy.cache_by, CacheBy::FullResult, "{path}");
            assert_eq!(policy.pixel_format, PixelFormat::PreferAlphaCapable, "{path}");
            assert!(!policy.animate, "{path}");
        }
    }

    #[test]
    fn animated_image_follows_preference() {
        let variant = classify(Path::new("/sdcard/loop.gif"));
        assert_eq!(variant, Variant::AnimatedImage);

        let playing = policy_for(variant, true).unwrap();
        assert_eq!(playing.cache_by, CacheBy::SourceBytes);
        assert_eq!(playing.pixel_format, PixelFormat::PreferAlphaCapable);
        assert!(playing.animate);

        let frozen = policy_for(variant, false).unwrap();
        assert_eq!(
            (frozen.cache_by, frozen.pixel_format, frozen.animate),
            (CacheBy::SourceBytes, PixelFormat::PreferAlphaCapable, false)
        );
    }

    #[test]
    fn unsupported_has_no_policy() {
        assert_eq!(classify(Path::new("/sdcard/notes.txt")), Variant::Unsupported);
        assert_eq!(policy_for(Variant::Unsupported, true), None);
        assert!(LoadRequest::for_path("/sdcard/notes.txt").is_none());
    }

    #[test]
    fn classify_is_total() {
        let paths = [
            "a.jpg", "b.JPEG", "c.png", "d.gif", "e.mp4", "f.mkv", "g.txt", "h", ".nomedia",
            "i.tar.gz", "",
        ];
        for path in paths {
            let variant = classify(Path::new(path));
            let supported = variant.is_supported();
            assert_eq!(policy_for(variant, false).is_some(), supported, "{path}");
        }
    }

    #[test]
    fn extensionless_file_is_sniffed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("IMG_0042");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"GIF89a\x01\x00\x01\x00\x00\x00\x00").unwrap();
        drop(file);

        assert_eq!(classify(&path), Variant::AnimatedImage);
    }

    #[test]
    fn selector_uses_config_preference() {
        let config = Config {
            animate_gifs: false,
            ..Config::default()
        };
        let selector = MediaPolicySelector::from_config(&config);
        let request = LoadRequest::for_path("/sdcard/loop.gif").unwrap();
        let policy = selector.policy_for_request(&request).unwrap();
        assert!(!policy.animate);
        assert_eq!(policy.cache_by, CacheBy::SourceBytes);
    }
}
