use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use chacha20poly1305::aead::rand_core::RngCore;
use chacha20poly1305::aead::{Aead, KeyInit, OsRng, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;

const VERSION: u8 = 0x01;
const HEADER_LEN: usize = 1 + 8;

/// Ciphertexts stamped further than this into the future are rejected.
pub const MAX_CLOCK_SKEW_SECS: u64 = 60;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CryptoError {
    #[error("secure random source failed")]
    Entropy,
    #[error("encryption failed")]
    Encryption,
    #[error("authentication failed (invalid key or corrupted data)")]
    AuthenticationFailed,
    #[error("invalid key length; expected {KEY_LEN} bytes")]
    InvalidKeyLength,
}

/// Per-secret symmetric key. Never persisted server side; it only travels
/// inside the token.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct DecryptionKey([u8; KEY_LEN]);

impl DecryptionKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength)?;
        Ok(Self(key))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for DecryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DecryptionKey(<redacted>)")
    }
}

/// Fresh uniformly random key from the OS source.
pub fn generate_key() -> Result<DecryptionKey, CryptoError> {
    let mut key = [0u8; KEY_LEN];
    OsRng
        .try_fill_bytes(&mut key)
        .map_err(|_| CryptoError::Entropy)?;
    let out = DecryptionKey(key);
    key.zeroize();
    Ok(out)
}

/// Encrypts `plaintext` under a freshly generated key.
///
/// The returned blob is `version | issued_at (u64 BE) | nonce | ciphertext`,
/// with the version and timestamp authenticated as associated data.
pub fn encrypt_with_random_key(plaintext: &[u8]) -> Result<(Vec<u8>, DecryptionKey), CryptoError> {
    let key = generate_key()?;
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    let mut nonce = [0u8; NONCE_LEN];
    OsRng
        .try_fill_bytes(&mut nonce)
        .map_err(|_| CryptoError::Entropy)?;

    let header = header(unix_now());
    let ciphertext = cipher
        .encrypt(
            XNonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad: &header,
            },
        )
        .map_err(|_| CryptoError::Encryption)?;

    let mut storage = Vec::with_capacity(HEADER_LEN + NONCE_LEN + ciphertext.len());
    storage.extend_from_slice(&header);
    storage.extend_from_slice(&nonce);
    storage.extend_from_slice(&ciphertext);

    Ok((storage, key))
}

/// Authenticates and decrypts a blob produced by [`encrypt_with_random_key`].
///
/// Every failure, including an empty or truncated blob, is reported as
/// [`CryptoError::AuthenticationFailed`].
pub fn decrypt_with_random_key(
    encrypted_blob: &[u8],
    key: &DecryptionKey,
) -> Result<Vec<u8>, CryptoError> {
    decrypt_at(encrypted_blob, key, unix_now())
}

fn decrypt_at(encrypted_blob: &[u8], key: &DecryptionKey, now: u64) -> Result<Vec<u8>, CryptoError> {
    if encrypted_blob.len() < HEADER_LEN + NONCE_LEN + TAG_LEN {
        return Err(CryptoError::AuthenticationFailed);
    }

    let (header, rest) = encrypted_blob.split_at(HEADER_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

    if header[0] != VERSION {
        return Err(CryptoError::AuthenticationFailed);
    }

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let plaintext = cipher
        .decrypt(
            XNonce::from_slice(nonce_bytes),
            Payload {
                msg: ciphertext,
                aad: header,
            },
        )
        .map_err(|_| CryptoError::AuthenticationFailed)?;

    let mut issued = [0u8; 8];
    issued.copy_from_slice(&header[1..HEADER_LEN]);
    if u64::from_be_bytes(issued) > now.saturating_add(MAX_CLOCK_SKEW_SECS) {
        return Err(CryptoError::AuthenticationFailed);
    }

    Ok(plaintext)
}

fn header(issued_at: u64) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[0] = VERSION;
    header[1..].copy_from_slice(&issued_at.to_be_bytes());
    header
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn round_trip() {
        let (blob, key) = encrypt_with_random_key(b"correct horse battery staple").unwrap();
        let plain = decrypt_with_random_key(&blob, &key).unwrap();
        assert_eq!(plain, b"correct horse battery staple");
    }

    #[test]
    fn keys_are_fresh_per_secret() {
        let (_, a) = encrypt_with_random_key(b"x").unwrap();
        let (_, b) = encrypt_with_random_key(b"x").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails() {
        let (blob, _) = encrypt_with_random_key(b"secret").unwrap();
        let other = generate_key().unwrap();
        assert_eq!(
            decrypt_with_random_key(&blob, &other),
            Err(CryptoError::AuthenticationFailed)
        );
    }

    #[test]
    fn empty_and_truncated_blobs_fail() {
        let key = generate_key().unwrap();
        assert_eq!(
            decrypt_with_random_key(&[], &key),
            Err(CryptoError::AuthenticationFailed)
        );

        let (blob, key) = encrypt_with_random_key(b"").unwrap();
        assert_eq!(
            decrypt_with_random_key(&blob[..blob.len() - 1], &key),
            Err(CryptoError::AuthenticationFailed)
        );
    }

    #[test]
    fn empty_plaintext_still_authenticates() {
        let (blob, key) = encrypt_with_random_key(b"").unwrap();
        assert_eq!(decrypt_with_random_key(&blob, &key).unwrap(), b"");
    }

    #[test]
    fn tampered_header_fails() {
        let (mut blob, key) = encrypt_with_random_key(b"secret").unwrap();
        blob[4] ^= 0x01;
        assert_eq!(
            decrypt_with_random_key(&blob, &key),
            Err(CryptoError::AuthenticationFailed)
        );
    }

    #[test]
    fn unknown_version_fails() {
        let (mut blob, key) = encrypt_with_random_key(b"secret").unwrap();
        blob[0] = 0x80;
        assert_eq!(
            decrypt_with_random_key(&blob, &key),
            Err(CryptoError::AuthenticationFailed)
        );
    }

    #[test]
    fn future_timestamp_is_rejected() {
        let (blob, key) = encrypt_with_random_key(b"secret").unwrap();
        let now = unix_now();

        assert!(decrypt_at(&blob, &key, now).is_ok());
        // Decrypting "in the past" makes the blob look like it came from the future.
        assert!(decrypt_at(&blob, &key, now - MAX_CLOCK_SKEW_SECS + 5).is_ok());
        assert_eq!(
            decrypt_at(&blob, &key, now - MAX_CLOCK_SKEW_SECS - 5),
            Err(CryptoError::AuthenticationFailed)
        );
    }

    #[test]
    fn old_ciphertext_is_still_accepted() {
        let (blob, key) = encrypt_with_random_key(b"secret").unwrap();
        let much_later = unix_now() + 60 * 60 * 24 * 365;
        assert!(decrypt_at(&blob, &key, much_later).is_ok());
    }

    #[test]
    fn key_length_is_checked() {
        assert_eq!(
            DecryptionKey::from_bytes(&[0u8; 31]),
            Err(CryptoError::InvalidKeyLength)
        );
        assert!(DecryptionKey::from_bytes(&[0u8; KEY_LEN]).is_ok());
    }

    #[test]
    fn debug_does_not_leak_key() {
        let key = DecryptionKey::from_bytes(&[0xAB; KEY_LEN]).unwrap();
        assert_eq!(format!("{key:?}"), "DecryptionKey(<redacted>)");
    }

    proptest! {
        #[test]
        fn any_single_byte_flip_is_detected(
            plaintext in proptest::collection::vec(any::<u8>(), 0..256),
            idx in any::<prop::sample::Index>(),
            flip in 1u8..=255,
        ) {
            let (mut blob, key) = encrypt_with_random_key(&plaintext).unwrap();
            let i = idx.index(blob.len());
            blob[i] ^= flip;
            prop_assert_eq!(
                decrypt_with_random_key(&blob, &key),
                Err(CryptoError::AuthenticationFailed)
            );
        }
    }
}
