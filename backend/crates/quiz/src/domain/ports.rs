//! Outbound ports
//!
//! Third-party services the admission pipeline talks to. Adapters live in
//! the infrastructure layer; tests substitute in-memory fakes.

use thiserror::Error;

use crate::domain::entities::CrmLead;
use crate::domain::value_objects::CaptchaOutcome;

/// CAPTCHA provider
#[trait_variant::make(CaptchaVerifier: Send)]
pub trait LocalCaptchaVerifier {
    /// Verify a client token
    ///
    /// Transport failures are reported as a failed outcome, never as an error.
    async fn verify(&self, token: Option<&str>, remote_ip: Option<&str>) -> CaptchaOutcome;
}

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("CRM token is not configured")]
    NotConfigured,

    #[error("CRM request timed out")]
    Timeout,

    #[error("CRM transport error: {0}")]
    Transport(String),

    #[error("CRM responded with status {status}")]
    Rejected { status: u16, body: String },
}

/// Lead destination
#[trait_variant::make(CrmSink: Send)]
pub trait LocalCrmSink {
    async fn send_lead(&self, lead: &CrmLead) -> Result<(), CrmError>;
}
