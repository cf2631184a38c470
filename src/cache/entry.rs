//! Cache Entry Module
//!
//! Defines the structure for stored cache entries with expiry and version
//! metadata.

use chrono::{DateTime, Utc};

// == Cache Entry ==
/// Represents a single stored row: the encoded payload plus its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Canonical byte key, namespace-prefixed, at most 255 bytes
    pub key: Vec<u8>,
    /// Encoded payload (possibly compressed)
    pub value: Vec<u8>,
    /// Tag identifying the codec that produced `value`; None means plain
    pub compression: Option<String>,
    /// Caller-supplied version tag; informational, not part of the key
    pub version: Option<String>,
    /// Insert timestamp, preserved across overwrites
    pub created_at: DateTime<Utc>,
    /// Expiration instant, None = never expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// Boundary condition: an entry is expired when the current time is
    /// greater than or equal to the expiration instant.
    pub fn is_expired(&self) -> bool {
        self.expired_as_of(Utc::now())
    }

    /// Checks expiry against an explicit instant.
    pub fn expired_as_of(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    // == Version Mismatch ==
    /// Checks whether the stored version conflicts with a requested one.
    ///
    /// A mismatch requires both sides to be present and different; a read
    /// without a version matches any row, and an unversioned row matches
    /// any read.
    pub fn mismatched(&self, requested: Option<&str>) -> bool {
        matches!(
            (self.version.as_deref(), requested),
            (Some(stored), Some(req)) if stored != req
        )
    }
}
