use serde::{Deserialize, Serialize};

/// What the decode cache keeps on disk for a file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum CacheBy {
    /// The decoded, transformed bitmap.
    FullResult,
    /// The original encoded bytes.
    SourceBytes,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum PixelFormat {
    PreferOpaque,
    PreferAlphaCapable,
}

/// How the loader should cache, decode and present one file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct CachingPolicy {
    pub cache_by: CacheBy,
    pub pixel_format: PixelFormat,
    pub animate: bool,
    pub cross_fade: bool,
}
