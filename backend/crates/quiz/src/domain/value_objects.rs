//! Domain Value Objects
//!
//! Immutable value types for the quiz domain.

use kernel::id::QuizSessionId;
use platform::client::{ClientContext, is_placeholder};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a submission was dropped without a trace
///
/// Only ever logged. Clients see the same response for every kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectKind {
    RateLimited,
    Unauthenticated,
    InvalidToken,
    BindingMismatch,
    SessionInvalid,
    SessionExpired,
    FingerprintInvalid,
    CaptchaFailed,
    MissingFields,
}

impl RejectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectKind::RateLimited => "rate_limited",
            RejectKind::Unauthenticated => "unauthenticated",
            RejectKind::InvalidToken => "invalid_token",
            RejectKind::BindingMismatch => "binding_mismatch",
            RejectKind::SessionInvalid => "session_invalid",
            RejectKind::SessionExpired => "session_expired",
            RejectKind::FingerprintInvalid => "fingerprint_invalid",
            RejectKind::CaptchaFailed => "captcha_failed",
            RejectKind::MissingFields => "missing_fields",
        }
    }
}

impl fmt::Display for RejectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a submission was stored as a bot record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotReason {
    DeniedUserAgent,
    CaptchaFailed,
}

impl BotReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BotReason::DeniedUserAgent => "denied_user_agent",
            BotReason::CaptchaFailed => "captcha_failed",
        }
    }
}

impl fmt::Display for BotReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims carried by a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokenClaims {
    pub session_id: String,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub ua: Option<String>,
}

/// Session token that passed signature and expiry checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSessionToken {
    pub session_id: QuizSessionId,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl VerifiedSessionToken {
    /// Client binding check
    ///
    /// Each attribute is compared only when both the token and the request
    /// carry a real value. Placeholders on either side never cause a mismatch.
    pub fn is_bound_to(&self, client: &ClientContext) -> bool {
        let request_ip = client.ip_string();
        attribute_matches(self.ip.as_deref(), request_ip.as_deref())
            && attribute_matches(self.user_agent.as_deref(), client.user_agent())
    }
}

fn attribute_matches(bound: Option<&str>, presented: Option<&str>) -> bool {
    if is_placeholder(bound) || is_placeholder(presented) {
        return true;
    }
    bound.map(str::trim) == presented.map(str::trim)
}

/// Result of a CAPTCHA verification
///
/// Verification never errors: an unreachable provider is a failed outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptchaOutcome {
    pub success: bool,
    pub score: Option<f64>,
    pub error_codes: Vec<String>,
    /// Verification is disabled (no secret configured)
    pub skipped: bool,
}

impl CaptchaOutcome {
    pub fn passed(score: Option<f64>) -> Self {
        Self {
            success: true,
            score,
            error_codes: Vec::new(),
            skipped: false,
        }
    }

    pub fn skipped() -> Self {
        Self {
            success: true,
            score: None,
            error_codes: Vec::new(),
            skipped: true,
        }
    }

    pub fn failed(error_codes: Vec<String>) -> Self {
        Self {
            success: false,
            score: None,
            error_codes,
            skipped: false,
        }
    }
}

/// Fully-populated contact fields of an accepted submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactDetails {
    pub name: String,
    pub phone: String,
    pub contact_method: String,
}

impl ContactDetails {
    /// All three fields present and non-blank, otherwise None
    pub fn from_parts(
        name: Option<&str>,
        phone: Option<&str>,
        contact_method: Option<&str>,
    ) -> Option<Self> {
        let required = |value: Option<&str>| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Some(Self {
            name: required(name)?,
            phone: required(phone)?,
            contact_method: required(contact_method)?,
        })
    }
}
