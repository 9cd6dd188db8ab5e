pub mod crypto;
pub mod token;
pub mod ttl;

pub use crypto::{CryptoError, DecryptionKey};
pub use token::{SecretId, TokenError};
pub use ttl::{Ttl, TtlError};
