//! Cache Module
//!
//! Provides the durable cache engine: key normalization, entry encoding,
//! expiry and version policy, and size-bound eviction.

mod codec;
mod engine;
mod entry;
mod eviction;
mod key;
mod stats;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use codec::Compression;
pub use engine::{CacheStore, ReadOptions, WriteOptions};
pub use entry::Entry;
pub use eviction::Evictor;
pub use key::{namespace_prefix, normalize, prefix_upper_bound};
pub use stats::{CacheStats, StatsSnapshot};

// == Public Constants ==
/// Maximum allowed key length in bytes, the backing store's primary-key width
pub const MAX_KEY_LENGTH: usize = 255;

/// Serialized payloads at or above this size are compressed when a scheme
/// is configured; smaller payloads are stored plain to skip decompression
/// cost on read
pub const COMPRESSION_THRESHOLD: usize = 1024;
