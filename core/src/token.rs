//! Compound token carried in the share URL: `{SecretId}~{urlsafe(key)}`.
//!
//! The id alphabet is lowercase hex plus `-` and the key alphabet is URL-safe
//! base64, so the separator never occurs inside either part.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE;
use thiserror::Error;
use uuid::Uuid;

use crate::crypto::DecryptionKey;

pub const TOKEN_SEPARATOR: char = '~';

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("token must contain exactly one '{TOKEN_SEPARATOR}' separator")]
    SeparatorCount,
    #[error("token has an empty part")]
    EmptyPart,
    #[error("token id is not a valid secret id")]
    InvalidId,
    #[error("token key is not valid key material")]
    InvalidKey,
}

/// Store identifier of one secret. Only constructible from a generated or
/// parsed UUID, which keeps it free of the token separator.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SecretId(String);

impl SecretId {
    /// Random v4 UUID, 122 bits of entropy.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().hyphenated().to_string())
    }

    /// Accepts only the canonical lowercase hyphenated spelling, so each
    /// secret answers to exactly one token.
    pub fn parse(raw: &str) -> Result<Self, TokenError> {
        let id = Uuid::try_parse(raw).map_err(|_| TokenError::InvalidId)?;
        let canonical = id.hyphenated().to_string();
        if canonical != raw {
            return Err(TokenError::InvalidId);
        }
        Ok(Self(canonical))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for log lines.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Display for SecretId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[must_use]
pub fn encode(id: &SecretId, key: &DecryptionKey) -> String {
    let key_b64 = URL_SAFE.encode(key.as_bytes());
    debug_assert!(!id.as_str().contains(TOKEN_SEPARATOR));
    format!("{id}{TOKEN_SEPARATOR}{key_b64}")
}

pub fn decode(token: &str) -> Result<(SecretId, DecryptionKey), TokenError> {
    let mut parts = token.split(TOKEN_SEPARATOR);
    let (Some(id), Some(key), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(TokenError::SeparatorCount);
    };

    if id.is_empty() || key.is_empty() {
        return Err(TokenError::EmptyPart);
    }

    let id = SecretId::parse(id)?;

    let decoded = URL_SAFE.decode(key).map_err(|_| TokenError::InvalidKey)?;
    let key = DecryptionKey::from_bytes(&decoded).map_err(|_| TokenError::InvalidKey)?;

    Ok((id, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_key;
    use proptest::prelude::*;

    const ID: &str = "3f2b8c4e-1d2a-4b6f-9e0a-7c5d4e3f2a1b";

    #[test]
    fn encode_then_decode() {
        let id = SecretId::generate();
        let key = generate_key().unwrap();

        let token = encode(&id, &key);
        assert_eq!(token.matches(TOKEN_SEPARATOR).count(), 1);
        assert!(token.starts_with(id.as_str()));

        let (parsed_id, parsed_key) = decode(&token).unwrap();
        assert_eq!(parsed_id, id);
        assert_eq!(parsed_key, key);
    }

    #[test]
    fn separator_count_must_be_one() {
        assert_eq!(decode(ID), Err(TokenError::SeparatorCount));
        assert_eq!(decode(""), Err(TokenError::SeparatorCount));
        assert_eq!(
            decode(&format!("{ID}~abc~def")),
            Err(TokenError::SeparatorCount)
        );
        assert_eq!(decode("~~"), Err(TokenError::SeparatorCount));
    }

    #[test]
    fn empty_parts_are_rejected() {
        assert_eq!(decode("~"), Err(TokenError::EmptyPart));
        assert_eq!(decode(&format!("{ID}~")), Err(TokenError::EmptyPart));
        assert_eq!(decode("~Zm9vYmFy"), Err(TokenError::EmptyPart));
    }

    #[test]
    fn bad_id_is_rejected() {
        let key = URL_SAFE.encode([7u8; 32]);
        assert_eq!(
            decode(&format!("abc123~{key}")),
            Err(TokenError::InvalidId)
        );
    }

    #[test]
    fn bad_key_is_rejected() {
        // not base64
        assert_eq!(decode(&format!("{ID}~!!!!")), Err(TokenError::InvalidKey));
        // valid base64, wrong length
        assert_eq!(
            decode(&format!("{ID}~Zm9vYmFy")),
            Err(TokenError::InvalidKey)
        );
        // standard alphabet is not accepted
        let std_key = "+".repeat(43) + "=";
        assert_eq!(
            decode(&format!("{ID}~{std_key}")),
            Err(TokenError::InvalidKey)
        );
    }

    #[test]
    fn only_canonical_ids_parse() {
        let id = SecretId::parse(ID).unwrap();
        assert_eq!(id.as_str(), ID);
        assert_eq!(id.prefix(), "3f2b8c4e");

        let simple = ID.replace('-', "");
        for alias in [
            ID.to_uppercase(),
            format!("urn:uuid:{ID}"),
            format!("{{{ID}}}"),
            simple.clone(),
            simple.to_uppercase(),
        ] {
            assert_eq!(SecretId::parse(&alias), Err(TokenError::InvalidId), "{alias}");
        }
    }

    #[test]
    fn aliased_ids_do_not_decode() {
        let key = URL_SAFE.encode([7u8; 32]);
        assert!(decode(&format!("{ID}~{key}")).is_ok());
        assert_eq!(
            decode(&format!("urn:uuid:{ID}~{key}")),
            Err(TokenError::InvalidId)
        );
        assert_eq!(
            decode(&format!("{{{ID}}}~{key}")),
            Err(TokenError::InvalidId)
        );
        assert_eq!(
            decode(&format!("{}~{key}", ID.replace('-', "").to_uppercase())),
            Err(TokenError::InvalidId)
        );
    }

    proptest! {
        #[test]
        fn decode_never_panics(input in ".*") {
            let _ = decode(&input);
        }

        #[test]
        fn tokens_with_extra_separators_are_rejected(
            left in "[a-z0-9-]{0,40}",
            mid in "[A-Za-z0-9_=-]{0,40}",
            right in "[A-Za-z0-9_=-]{0,40}",
        ) {
            let token = format!("{left}~{mid}~{right}");
            prop_assert_eq!(decode(&token), Err(TokenError::SeparatorCount));
        }
    }
}
