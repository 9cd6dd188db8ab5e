use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::errors::StoreError;
use crate::store::SecretStore;

/// In-process store for local development and tests.
///
/// Expiry is checked on every access against a clock that tests can push
/// forward with [`MemoryStore::advance`]. Every write also sweeps out all
/// expired records, so unopened secrets do not outlive their TTL in memory.
/// Clones share the same records.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    records: HashMap<String, Record>,
    skew: Duration,
}

struct Record {
    ciphertext: Vec<u8>,
    expires_at: Instant,
}

impl Inner {
    fn now(&self) -> Instant {
        Instant::now() + self.skew
    }

    /// Drops `key` if it has expired and returns the live record, if any.
    fn live(&mut self, key: &str) -> Option<&mut Record> {
        let now = self.now();
        if self.records.get(key).is_some_and(|r| r.expires_at <= now) {
            self.records.remove(key);
        }
        self.records.get_mut(key)
    }

    fn sweep(&mut self) {
        let now = self.now();
        self.records.retain(|_, r| r.expires_at > now);
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    /// Moves this store's clock forward. Records that fall out of their TTL
    /// are dropped immediately.
    pub fn advance(&self, by: Duration) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.skew += by;
        inner.sweep();
        Ok(())
    }

    /// Number of unexpired records.
    pub fn len(&self) -> usize {
        self.lock().map_or(0, |inner| {
            let now = inner.now();
            inner.records.values().filter(|r| r.expires_at > now).count()
        })
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of unexpired records.
    pub fn keys(&self) -> Vec<String> {
        self.lock().map_or_else(
            |_| Vec::new(),
            |inner| {
                let now = inner.now();
                inner
                    .records
                    .iter()
                    .filter(|(_, r)| r.expires_at > now)
                    .map(|(k, _)| k.clone())
                    .collect()
            },
        )
    }

    /// Applies `f` to the stored ciphertext of a live record. Returns false
    /// when there is no such record.
    pub fn modify_raw(&self, key: &str, f: impl FnOnce(&mut Vec<u8>)) -> bool {
        let Ok(mut inner) = self.lock() else {
            return false;
        };
        match inner.live(key) {
            Some(record) => {
                f(&mut record.ciphertext);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    async fn put(&self, key: &str, ciphertext: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.sweep();
        let expires_at = inner.now() + ttl;
        inner.records.insert(
            key.to_string(),
            Record {
                ciphertext,
                expires_at,
            },
        );
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.lock()?.live(key).is_some())
    }

    async fn take(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut inner = self.lock()?;
        if inner.live(key).is_none() {
            return Ok(None);
        }
        Ok(inner.records.remove(key).map(|r| r.ciphertext))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }
}
