//! Publish, peek and consume of one-time secrets.
//!
//! The protocol holds no locks of its own. At-most-once disclosure rests
//! entirely on [`SecretStore::take`] being an atomic read-and-remove.

use std::future::Future;
use std::time::Duration;

use burnlink_core::crypto::{decrypt_with_random_key, encrypt_with_random_key};
use burnlink_core::{SecretId, Ttl, token};
use log::{debug, error, warn};
use zeroize::{Zeroize, Zeroizing};

use crate::config::{Config, DEFAULT_KEY_PREFIX, DEFAULT_MAX_SIZE, DEFAULT_STORE_TIMEOUT};
use crate::errors::{ProtocolError, StoreError};
use crate::store::SecretStore;

/// Token handed back by a successful publish.
#[derive(Debug, Clone)]
pub struct Published {
    pub token: String,
    pub ttl: Ttl,
}

#[derive(Clone)]
pub struct SecretProtocol<S> {
    store: S,
    key_prefix: String,
    timeout: Duration,
    max_size: usize,
}

impl<S: SecretStore> SecretProtocol<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            timeout: DEFAULT_STORE_TIMEOUT,
            max_size: DEFAULT_MAX_SIZE,
        }
    }

    pub fn from_config(store: S, config: &Config) -> Self {
        Self::new(store)
            .with_key_prefix(&config.key_prefix)
            .with_timeout(config.store_timeout)
            .with_max_size(config.max_size)
    }

    #[must_use]
    pub fn with_key_prefix(mut self, prefix: &str) -> Self {
        self.key_prefix = prefix.to_string();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Key under which `id` lives in the store.
    pub fn store_key(&self, id: &SecretId) -> String {
        format!("{}{id}", self.key_prefix)
    }

    /// Encrypts `plaintext`, stores the ciphertext for `ttl` and returns the
    /// token. Nothing is written when the request is invalid.
    ///
    /// A store error or timeout means the write may or may not have landed;
    /// no token is returned either way.
    pub async fn publish(&self, plaintext: &str, ttl: &str) -> Result<Published, ProtocolError> {
        let ttl: Ttl = ttl.parse()?;

        if plaintext.is_empty() {
            return Err(ProtocolError::InvalidRequest("secret is empty".to_string()));
        }
        if plaintext.len() > self.max_size {
            return Err(ProtocolError::InvalidRequest(format!(
                "secret is larger than {} bytes",
                self.max_size
            )));
        }

        let (ciphertext, key) = encrypt_with_random_key(plaintext.as_bytes())?;
        let id = SecretId::generate();

        self.bounded(
            "publish",
            &id,
            self.store
                .put(&self.store_key(&id), ciphertext, ttl.as_duration()),
        )
        .await?;

        debug!("Published secret {} for {ttl}", id.prefix());

        Ok(Published {
            token: token::encode(&id, &key),
            ttl,
        })
    }

    /// Whether the secret behind `token` is still retrievable. Neither
    /// removes nor decrypts anything, and the answer may be stale by the
    /// time the caller acts on it.
    pub async fn peek(&self, token: &str) -> Result<bool, ProtocolError> {
        let (id, _) = token::decode(token)?;

        let exists = self
            .bounded("peek", &id, self.store.exists(&self.store_key(&id)))
            .await?;

        if !exists {
            debug!("Peek found no secret {}", id.prefix());
        }
        Ok(exists)
    }

    /// Removes the secret and returns its plaintext. `None` covers expired,
    /// never stored and already consumed alike.
    ///
    /// The record is gone once the store confirms the removal, so a decrypt
    /// failure afterwards loses the secret for good.
    pub async fn consume(&self, token: &str) -> Result<Option<Zeroizing<String>>, ProtocolError> {
        let (id, key) = token::decode(token)?;

        let Some(mut ciphertext) = self
            .bounded("consume", &id, self.store.take(&self.store_key(&id)))
            .await?
        else {
            debug!("Consume found no secret {}", id.prefix());
            return Ok(None);
        };

        let decrypted = decrypt_with_random_key(&ciphertext, &key);
        ciphertext.zeroize();

        let plaintext = decrypted.map_err(|e| {
            error!("Secret {} removed but failed to decrypt: {e}", id.prefix());
            ProtocolError::from(e)
        })?;

        match String::from_utf8(plaintext) {
            Ok(text) => Ok(Some(Zeroizing::new(text))),
            Err(e) => {
                e.into_bytes().zeroize();
                error!("Secret {} decrypted to invalid UTF-8", id.prefix());
                Err(ProtocolError::AuthenticationFailed)
            }
        }
    }

    /// Round trip to the store without touching any record.
    pub async fn health_check(&self) -> Result<(), ProtocolError> {
        match tokio::time::timeout(self.timeout, self.store.ping()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!("Store health check failed: {e}");
                Err(e.into())
            }
            Err(_) => {
                warn!("Store health check timed out after {:?}", self.timeout);
                Err(StoreError::Timeout(self.timeout).into())
            }
        }
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        id: &SecretId,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        let result = match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        };

        if let Err(e) = &result {
            warn!("Store {op} failed for secret {}: {e}", id.prefix());
        }
        result
    }
}
