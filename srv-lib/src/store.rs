//! Capabilities the protocol needs from the backing key-value store.

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::StoreError;

/// Shared store with per-key expiry and an atomic read-and-remove.
///
/// Implementations are cheap to clone and share one connection pool between
/// clones. Keys arrive already namespaced.
#[async_trait]
pub trait SecretStore: Clone + Send + Sync + 'static {
    /// Write `ciphertext` under `key`, readable for `ttl`. Overwrites any
    /// existing value.
    async fn put(&self, key: &str, ciphertext: Vec<u8>, ttl: Duration) -> Result<(), StoreError>;

    /// Whether an unexpired value exists. Never removes or extends it.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Atomically read and delete. Of any number of concurrent calls for one
    /// key at most one returns `Some`.
    async fn take(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Cheap liveness round trip. Must not touch any record.
    async fn ping(&self) -> Result<(), StoreError>;
}
