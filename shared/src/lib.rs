use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sent to the server when creating a new secret
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct CreateSecretRequest {
    pub plaintext: String,
    /// One of `hour`, `day`, `week`, `two weeks`
    pub ttl: String,
}

/// Gets returned by the server when creating a new secret
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct CreateSecretResponse {
    pub link: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of checking a link without opening it
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct SecretStatus {
    pub exists: bool,
}

/// The plaintext, returned exactly once
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct RevealedSecret {
    pub plaintext: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_uses_plain_ttl_string() {
        let req: CreateSecretRequest =
            serde_json::from_str(r#"{"plaintext":"hunter2","ttl":"two weeks"}"#).unwrap();
        assert_eq!(req.plaintext, "hunter2");
        assert_eq!(req.ttl, "two weeks");
    }

    #[test]
    fn status_wire_shape() {
        let json = serde_json::to_string(&SecretStatus { exists: false }).unwrap();
        assert_eq!(json, r#"{"exists":false}"#);
    }
}
