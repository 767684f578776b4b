pub mod media;
pub mod policy;

pub use media::*;
pub use policy::{CacheBy, CachingPolicy, PixelFormat};
