//! Configuration Module
//!
//! Handles loading and managing store configuration from environment variables.

use std::env;

/// Cache store configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Compression scheme name applied to large payloads (e.g. "gzip").
    /// None disables compression entirely.
    pub compression: Option<String>,
    /// Maximum number of entries allowed in the store. Going over first runs
    /// an expired-entry cleanup and then deletes the oldest entry.
    /// None disables the cap.
    pub max_entries: Option<u64>,
    /// Default TTL in seconds applied to writes without an explicit expiry.
    /// None means entries never expire unless the write says so.
    pub default_ttl: Option<u64>,
    /// When true, every write and delete also purges expired entries.
    pub auto_cleanup: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_COMPRESSION` - Compression scheme name (default: unset)
    /// - `CACHE_MAX_ENTRIES` - Maximum entry count (default: unset)
    /// - `CACHE_DEFAULT_TTL` - Default TTL in seconds (default: unset)
    /// - `CACHE_AUTO_CLEANUP` - "true"/"1" to purge expired rows on write (default: false)
    pub fn from_env() -> Self {
        Self {
            compression: env::var("CACHE_COMPRESSION").ok().filter(|v| !v.is_empty()),
            max_entries: env::var("CACHE_MAX_ENTRIES")
                .ok()
                .and_then(|v| v.parse().ok()),
            default_ttl: env::var("CACHE_DEFAULT_TTL")
                .ok()
                .and_then(|v| v.parse().ok()),
            auto_cleanup: env::var("CACHE_AUTO_CLEANUP")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }
}
