//! Error types for the cache store
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Store Error Enum ==
/// Unified error type for the cache store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Normalized key exceeds the backing store's primary-key width
    #[error("namespaced key exceeds the {limit}-byte length limit ({length} bytes)")]
    KeyTooLong { length: usize, limit: usize },

    /// Compression scheme is not known to this build
    #[error("unsupported compression scheme: {0}")]
    UnsupportedCompression(String),

    /// Value could not be serialized or deserialized
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Compressed payload could not be produced or read back
    #[error("compression failed: {0}")]
    Compression(#[from] std::io::Error),

    /// Backing store reported an error
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

// == Result Type Alias ==
/// Convenience Result type for the cache store.
pub type Result<T> = std::result::Result<T, StoreError>;
