use burnlink_core::{CryptoError, TokenError, TtlError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store did not answer within {0:?}")]
    Timeout(std::time::Duration),
}

/// Outcomes of the secret protocol that are not a plain found/not-found.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("invalid token: {0}")]
    InvalidToken(#[from] TokenError),
    #[error("secret failed authentication after removal")]
    AuthenticationFailed,
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),
    #[error("encryption failed: {0}")]
    Crypto(CryptoError),
}

impl From<TtlError> for ProtocolError {
    fn from(e: TtlError) -> Self {
        ProtocolError::InvalidRequest(e.to_string())
    }
}

impl From<CryptoError> for ProtocolError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::AuthenticationFailed | CryptoError::InvalidKeyLength => {
                ProtocolError::AuthenticationFailed
            }
            CryptoError::Entropy | CryptoError::Encryption => ProtocolError::Crypto(e),
        }
    }
}
