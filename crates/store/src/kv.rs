//! Shared key/value store abstraction
//!
//! The only primitive the ownership protocol needs for safety is atomic
//! set-if-absent ([`KvStore::set_nx`]); everything else is plain reads,
//! writes, and TTL maintenance. Values are short strings (instance ids and
//! lock nonces), so the API trades in `String` rather than bytes.

use agora_core::Result;
use async_trait::async_trait;
use std::time::Duration;

/// A shared key/value store with per-key TTLs.
///
/// All instances of a deployment see the same keyspace. Keys expire on their
/// own when their TTL lapses; a missing key and an expired key are
/// indistinguishable.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a key. `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a key, replacing any prior value. `ttl: None` persists until
    /// deleted.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Write a key only if it is absent. Returns whether the write happened.
    ///
    /// This is the atomic claim primitive for leases and locks.
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// Delete a key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete a key only if it currently holds `expected`.
    ///
    /// Returns whether the delete happened. Used for value-verified lock
    /// release.
    async fn delete_if_eq(&self, key: &str, expected: &str) -> Result<bool>;

    /// Extend a key's TTL. Returns false if the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Remaining TTL of a key. `None` when the key is absent, expired, or
    /// has no expiry.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>>;
}
