//! Store Gateway Module
//!
//! The key-value store primitives the synchronizer is built on.
//!
//! ## Atomicity Contract
//! Every method is atomic with respect to the key it touches. Sequences of
//! calls are not: nothing in this trait lets a caller hold a key across two
//! round-trips.
//!
//! ## Implementations
//! - [`MemoryStore`]: in-process hash store (also what the server serves)
//! - [`RemoteGateway`]: pooled TCP client for a running `hashsync-server`

mod memory;
mod remote;

pub use memory::MemoryStore;
pub use remote::RemoteGateway;

use crate::bound::{BoundedOutcome, BoundedStep};
use crate::error::{Result, SyncError};
use crate::mapper::FieldMap;

/// Atomic primitives of a store offering string and hash values
pub trait StoreGateway: Send + Sync {
    // -------------------------------------------------------------------------
    // String Keys
    // -------------------------------------------------------------------------

    /// Value of a string key
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Set a string key, clearing any expiry
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Increment a string key by one (missing keys start at 0)
    fn incr(&self, key: &str) -> Result<i64>;

    // -------------------------------------------------------------------------
    // Key Lifecycle
    // -------------------------------------------------------------------------

    fn exists(&self, key: &str) -> Result<bool>;

    /// Expire `key` after `seconds`; false if the key does not exist.
    /// Zero deletes the key; a span too far out to represent never expires.
    fn expire(&self, key: &str, seconds: u64) -> Result<bool>;

    /// Remaining time to live, `None` for missing or persistent keys
    fn ttl(&self, key: &str) -> Result<Option<u64>>;

    /// Delete keys, returning how many existed
    fn delete(&self, keys: &[&str]) -> Result<u64>;

    // -------------------------------------------------------------------------
    // Hash Entries
    // -------------------------------------------------------------------------

    /// Replace the whole hash at `key` with `fields`
    fn hash_set_all(&self, key: &str, fields: &FieldMap) -> Result<()>;

    /// Set one field; true if the field was created
    fn hash_set_field(&self, key: &str, field: &str, value: &str) -> Result<bool>;

    fn hash_get_field(&self, key: &str, field: &str) -> Result<Option<String>>;

    /// All fields of the hash (empty when the key is missing)
    fn hash_get_all(&self, key: &str) -> Result<FieldMap>;

    /// Add `delta` to an integer field (missing fields start at 0)
    fn hash_increment_field(&self, key: &str, field: &str, delta: i64) -> Result<i64>;

    /// Delete fields, returning how many existed
    fn hash_delete_fields(&self, key: &str, fields: &[&str]) -> Result<u64>;

    fn hash_exists_field(&self, key: &str, field: &str) -> Result<bool>;

    fn hash_values(&self, key: &str) -> Result<Vec<String>>;

    /// Apply a bounded step as one atomic operation
    ///
    /// Stores that cannot do this leave the default, which refuses with
    /// `Unsupported`.
    fn hash_increment_bounded(
        &self,
        key: &str,
        field: &str,
        step: BoundedStep,
    ) -> Result<BoundedOutcome> {
        let _ = (key, field, step);
        Err(SyncError::Unsupported(
            "atomic bounded increment is not offered by this gateway".to_string(),
        ))
    }
}

/// Parse a stored counter value
pub(crate) fn parse_counter(key: &str, field: Option<&str>, raw: &str) -> Result<i64> {
    raw.parse::<i64>()
        .map_err(|_| SyncError::parse(key, field, raw))
}
