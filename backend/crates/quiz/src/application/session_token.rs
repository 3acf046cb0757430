//! Session token issuing and verification
//!
//! A session token is an HS256 token carrying the session id plus the IP
//! and User-Agent the session was started from.

use chrono::{DateTime, Utc};
use platform::client::ClientContext;
use platform::token::{Hs256Codec, TokenError};

use crate::domain::value_objects::{SessionTokenClaims, VerifiedSessionToken};
use kernel::id::QuizSessionId;

#[derive(Debug, Clone)]
pub struct SessionTokenCodec {
    codec: Hs256Codec,
}

impl SessionTokenCodec {
    pub fn new(secret: &[u8]) -> Result<Self, TokenError> {
        Ok(Self {
            codec: Hs256Codec::new(secret)?,
        })
    }

    pub fn issue(
        &self,
        session_id: QuizSessionId,
        client: &ClientContext,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = SessionTokenClaims {
            session_id: session_id.to_string(),
            ip: client.ip_string(),
            ua: client.user_agent().map(str::to_string),
        };
        self.codec.sign(&claims, issued_at, expires_at)
    }

    pub fn verify(&self, token: &str) -> Option<VerifiedSessionToken> {
        self.verify_at(token, Utc::now())
    }

    /// Verified claims, or None for any defect
    ///
    /// Bad signature, expiry, a foreign algorithm and a missing or malformed
    /// session id are indistinguishable to the caller.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Option<VerifiedSessionToken> {
        let signed = match self.codec.decode::<SessionTokenClaims>(token, now) {
            Ok(signed) => signed,
            Err(e) => {
                tracing::debug!(reason = %e, "Session token rejected");
                return None;
            }
        };

        let session_id = match signed.claims.session_id.trim().parse::<QuizSessionId>() {
            Ok(id) => id,
            Err(_) => {
                tracing::debug!("Session token carries no usable session id");
                return None;
            }
        };

        Some(VerifiedSessionToken {
            session_id,
            ip: signed.claims.ip,
            user_agent: signed.claims.ua,
            issued_at: signed.iat,
            expires_at: signed.exp,
        })
    }
}
