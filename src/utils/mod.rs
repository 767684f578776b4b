pub mod signature;

pub use signature::sniff_variant;
