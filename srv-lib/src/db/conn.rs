use std::fs::read;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::TimeDelta;
use diesel::ConnectionError;
use diesel::ConnectionResult;
use diesel_async::AsyncPgConnection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::pooled_connection::ManagerConfig;
use diesel_async::pooled_connection::bb8::Pool;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use log::{error, info};
use rustls::ClientConfig;
use rustls::RootCertStore;
use rustls::pki_types::CertificateDer;
use rustls::pki_types::pem::PemObject;
use tokio::time::Duration;

use crate::config::DatabaseConfig;
use crate::db::models::Secret;
use crate::errors::StoreError;
use crate::store::SecretStore;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Pooled PostgreSQL handle. Clones share the pool.
#[derive(Clone)]
pub struct Handler {
    conn: Pool<AsyncPgConnection>,
}

#[derive(Clone)]
struct TlsSetup {
    enabled: bool,
    cert_location: Option<PathBuf>,
}

/// Builds the pool, creates the table if needed and starts the expired row
/// cleanup task.
pub async fn get_connection(config: &DatabaseConfig) -> Result<Handler, StoreError> {
    // Fails only when a provider is already installed, which is fine.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let tls = TlsSetup {
        enabled: config.tls,
        cert_location: config.cert_location.clone(),
    };

    let mut manager_config = ManagerConfig::default();
    manager_config.custom_setup = Box::new(move |url| establish_connection(url, tls.clone()));
    let mgr =
        AsyncDieselConnectionManager::<AsyncPgConnection>::new_with_config(&config.url, manager_config);

    let conn = Pool::builder()
        .max_size(config.pool_size)
        .min_idle(Some(config.pool_size.min(5)))
        .connection_timeout(config.connect_timeout)
        .max_lifetime(Some(Duration::from_secs(60 * 60 * 24)))
        .idle_timeout(Some(Duration::from_secs(60 * 2)))
        .build(mgr)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

    let handler = Handler { conn };

    {
        let mut conn = handler
            .conn
            .get()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Secret::create_table(&mut conn).await.map_err(db_error)?;
    }

    let handler_clone = handler.clone();

    tokio::spawn(async move {
        handler_clone.initiate_expired_cleanup().await;
    });

    Ok(handler)
}

fn establish_connection(
    config: &str,
    tls: TlsSetup,
) -> BoxFuture<'_, ConnectionResult<AsyncPgConnection>> {
    let fut = async move {
        if !tls.enabled {
            let (client, conn) = tokio_postgres::connect(config, tokio_postgres::NoTls)
                .await
                .map_err(|e| ConnectionError::BadConnection(e.to_string()))?;
            return AsyncPgConnection::try_from_client_and_connection(client, conn).await;
        }

        let mut root_store = RootCertStore::empty();

        // Specifically for working with self signed certs.
        if let Some(cert_location) = &tls.cert_location {
            let file_bytes =
                read(cert_location).map_err(|e| ConnectionError::BadConnection(e.to_string()))?;
            let cert = CertificateDer::from_pem_slice(&file_bytes)
                .map_err(|e| ConnectionError::BadConnection(e.to_string()))?;
            root_store
                .add(cert)
                .map_err(|e| ConnectionError::BadConnection(e.to_string()))?;
        }

        let rustls_config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let tls = tokio_postgres_rustls::MakeRustlsConnect::new(rustls_config);
        let (client, conn) = tokio_postgres::connect(config, tls)
            .await
            .map_err(|e| ConnectionError::BadConnection(e.to_string()))?;

        AsyncPgConnection::try_from_client_and_connection(client, conn).await
    };
    fut.boxed()
}

fn db_error(e: diesel::result::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

impl Handler {
    pub async fn clear_expired(&self) -> Result<usize, StoreError> {
        let mut conn = self
            .conn
            .get()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Secret::clear_expired(&mut conn).await.map_err(db_error)
    }

    async fn initiate_expired_cleanup(&self) {
        loop {
            tokio::time::sleep(CLEANUP_INTERVAL).await;
            match self.clear_expired().await {
                Ok(0) => {}
                Ok(n) => info!("Cleared {n} expired secrets"),
                Err(e) => error!("Failed to clear expired secrets: {e}"),
            }
        }
    }
}

#[async_trait]
impl SecretStore for Handler {
    async fn put(&self, key: &str, ciphertext: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        let ttl = TimeDelta::from_std(ttl).map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let mut conn = self
            .conn
            .get()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Secret::new(key, ciphertext, ttl)
            .insert(&mut conn)
            .await
            .map_err(db_error)?;

        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self
            .conn
            .get()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Secret::exists(key, &mut conn).await.map_err(db_error)
    }

    async fn take(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self
            .conn
            .get()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Secret::take(key, &mut conn).await.map_err(db_error)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self
            .conn
            .get()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Secret::ping(&mut conn).await.map_err(db_error)
    }
}
