//! Compact HS256 Signed Tokens
//!
//! JWT-compatible `header.claims.signature` tokens, restricted to HS256.
//! The algorithm is fixed on both sides: a token whose header names any
//! other algorithm is rejected before the signature is looked at.
//!
//! Expiry has whole-second precision: a token signed with expiry `t` is
//! valid while `now < t` (seconds since epoch).

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{from_base64url, hmac_sha256, to_base64url, verify_hmac_sha256};

const ALGORITHM: &str = "HS256";
const TOKEN_TYPE: &str = "JWT";

/// Token codec errors
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Signing key is empty")]
    EmptyKey,

    #[error("Malformed token")]
    Malformed,

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid signature")]
    BadSignature,

    #[error("Token expired")]
    Expired,

    #[error("Claims serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default)]
    typ: Option<String>,
}

/// Claims plus the registered timing claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signed<T> {
    #[serde(flatten)]
    pub claims: T,
    /// Issued at (seconds since epoch)
    pub iat: i64,
    /// Expires at (seconds since epoch)
    pub exp: i64,
}

/// HS256 signer/verifier holding the process-wide key
#[derive(Clone)]
pub struct Hs256Codec {
    key: Vec<u8>,
}

impl std::fmt::Debug for Hs256Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hs256Codec")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl Hs256Codec {
    pub fn new(key: impl Into<Vec<u8>>) -> Result<Self, TokenError> {
        let key = key.into();
        if key.is_empty() {
            return Err(TokenError::EmptyKey);
        }
        Ok(Self { key })
    }

    /// Sign `claims` valid from `issued_at` until `expires_at`
    pub fn sign<T: Serialize>(
        &self,
        claims: &T,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let header = Header {
            alg: ALGORITHM.to_string(),
            typ: Some(TOKEN_TYPE.to_string()),
        };
        let body = Signed {
            claims,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let signing_input = format!(
            "{}.{}",
            to_base64url(&serde_json::to_vec(&header)?),
            to_base64url(&serde_json::to_vec(&body)?)
        );
        let signature = hmac_sha256(&self.key, signing_input.as_bytes());

        Ok(format!("{}.{}", signing_input, to_base64url(&signature)))
    }

    /// Verify signature and expiry at `now`, returning the claims
    pub fn decode<T: DeserializeOwned>(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Signed<T>, TokenError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed);
        };

        let header_bytes = from_base64url(header_b64).map_err(|_| TokenError::Malformed)?;
        let header: Header =
            serde_json::from_slice(&header_bytes).map_err(|_| TokenError::Malformed)?;
        if header.alg != ALGORITHM {
            return Err(TokenError::UnsupportedAlgorithm(header.alg));
        }

        let signature = from_base64url(signature_b64).map_err(|_| TokenError::Malformed)?;
        let signing_input = &token[..header_b64.len() + 1 + claims_b64.len()];
        if !verify_hmac_sha256(&self.key, signing_input.as_bytes(), &signature) {
            return Err(TokenError::BadSignature);
        }

        let claims_bytes = from_base64url(claims_b64).map_err(|_| TokenError::Malformed)?;
        let signed: Signed<T> =
            serde_json::from_slice(&claims_bytes).map_err(|_| TokenError::Malformed)?;

        if now.timestamp() >= signed.exp {
            return Err(TokenError::Expired);
        }

        Ok(signed)
    }
}
