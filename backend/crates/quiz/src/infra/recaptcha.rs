//! reCAPTCHA v3 verifier

use serde::Deserialize;
use std::time::Duration;

use crate::domain::ports::CaptchaVerifier;
use crate::domain::value_objects::CaptchaOutcome;
use crate::error::{QuizError, QuizResult};
use platform::client::is_placeholder;

pub const DEFAULT_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

const MISSING_INPUT_RESPONSE: &str = "missing-input-response";
const LOW_SCORE: &str = "low-score";
const UNKNOWN_ERROR: &str = "unknown-error";
const VERIFICATION_FAILED: &str = "verification-failed";

#[derive(Clone)]
pub struct RecaptchaConfig {
    /// None disables verification: every token passes
    pub secret: Option<String>,
    pub verify_url: String,
    pub min_score: f64,
    pub timeout: Duration,
}

impl std::fmt::Debug for RecaptchaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecaptchaConfig")
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("verify_url", &self.verify_url)
            .field("min_score", &self.min_score)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for RecaptchaConfig {
    fn default() -> Self {
        Self {
            secret: None,
            verify_url: DEFAULT_VERIFY_URL.to_string(),
            min_score: 0.5,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Provider response body
#[derive(Debug, Deserialize)]
pub struct SiteVerifyResponse {
    pub success: bool,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default, rename = "error-codes")]
    pub error_codes: Option<Vec<String>>,
}

/// Apply the score threshold to a provider response
///
/// A successful response without a score (reCAPTCHA v2) passes.
pub fn interpret(response: SiteVerifyResponse, min_score: f64) -> CaptchaOutcome {
    if !response.success {
        let codes = response
            .error_codes
            .filter(|codes| !codes.is_empty())
            .unwrap_or_else(|| vec![UNKNOWN_ERROR.to_string()]);
        return CaptchaOutcome::failed(codes);
    }

    match response.score {
        Some(score) if score < min_score => CaptchaOutcome {
            score: Some(score),
            ..CaptchaOutcome::failed(vec![LOW_SCORE.to_string()])
        },
        score => CaptchaOutcome::passed(score),
    }
}

#[derive(Debug, Clone)]
pub struct RecaptchaVerifier {
    client: reqwest::Client,
    config: RecaptchaConfig,
}

impl RecaptchaVerifier {
    pub fn new(config: RecaptchaConfig) -> QuizResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| QuizError::Configuration(format!("reCAPTCHA client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn is_enabled(&self) -> bool {
        self.config.secret.is_some()
    }

    async fn call(
        &self,
        secret: &str,
        token: &str,
        remote_ip: Option<&str>,
    ) -> Result<SiteVerifyResponse, reqwest::Error> {
        let mut form = vec![("secret", secret), ("response", token)];
        if let Some(ip) = remote_ip.filter(|ip| !is_placeholder(Some(ip))) {
            form.push(("remoteip", ip));
        }

        self.client
            .post(&self.config.verify_url)
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .json::<SiteVerifyResponse>()
            .await
    }
}

impl CaptchaVerifier for RecaptchaVerifier {
    async fn verify(&self, token: Option<&str>, remote_ip: Option<&str>) -> CaptchaOutcome {
        let Some(secret) = self.config.secret.as_deref() else {
            return CaptchaOutcome::skipped();
        };

        let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
            return CaptchaOutcome::failed(vec![MISSING_INPUT_RESPONSE.to_string()]);
        };

        match self.call(secret, token, remote_ip).await {
            Ok(response) => interpret(response, self.config.min_score),
            Err(e) => {
                tracing::warn!(error = %e, timeout = e.is_timeout(), "reCAPTCHA unreachable");
                CaptchaOutcome::failed(vec![VERIFICATION_FAILED.to_string()])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(success: bool, score: Option<f64>, codes: Option<Vec<&str>>) -> SiteVerifyResponse {
        SiteVerifyResponse {
            success,
            score,
            error_codes: codes.map(|c| c.into_iter().map(str::to_string).collect()),
        }
    }

    #[test]
    fn test_score_at_threshold_passes() {
        let outcome = interpret(response(true, Some(0.5), None), 0.5);
        assert!(outcome.success);
        assert_eq!(outcome.score, Some(0.5));
    }

    #[test]
    fn test_score_below_threshold_fails() {
        let outcome = interpret(response(true, Some(0.3), None), 0.5);
        assert!(!outcome.success);
        assert_eq!(outcome.error_codes, vec!["low-score"]);
        assert_eq!(outcome.score, Some(0.3));
    }

    #[test]
    fn test_provider_error_codes_are_kept() {
        let outcome = interpret(
            response(false, None, Some(vec!["timeout-or-duplicate"])),
            0.5,
        );
        assert!(!outcome.success);
        assert_eq!(outcome.error_codes, vec!["timeout-or-duplicate"]);
    }

    #[test]
    fn test_failure_without_codes_is_unknown_error() {
        let outcome = interpret(response(false, None, None), 0.5);
        assert_eq!(outcome.error_codes, vec!["unknown-error"]);

        let outcome = interpret(response(false, None, Some(vec![])), 0.5);
        assert_eq!(outcome.error_codes, vec!["unknown-error"]);
    }

    #[test]
    fn test_response_body_parses() {
        let body = r#"{"success":false,"error-codes":["invalid-input-response"]}"#;
        let parsed: SiteVerifyResponse = serde_json::from_str(body).unwrap();
        assert!(!parsed.success);
        assert_eq!(
            parsed.error_codes,
            Some(vec!["invalid-input-response".to_string()])
        );
    }

    #[tokio::test]
    async fn test_no_secret_skips_verification() {
        let verifier = RecaptchaVerifier::new(RecaptchaConfig::default()).unwrap();
        let outcome = verifier.verify(None, Some("203.0.113.7")).await;
        assert!(outcome.success);
        assert!(outcome.skipped);
    }

    #[tokio::test]
    async fn test_missing_token_fails_without_network() {
        let verifier = RecaptchaVerifier::new(RecaptchaConfig {
            secret: Some("secret".to_string()),
            // Unroutable: the request must never be sent
            verify_url: "http://127.0.0.1:9/siteverify".to_string(),
            ..RecaptchaConfig::default()
        })
        .unwrap();
        let outcome = verifier.verify(Some("  "), None).await;
        assert!(!outcome.success);
        assert_eq!(outcome.error_codes, vec!["missing-input-response"]);
    }

    #[tokio::test]
    async fn test_unreachable_provider_fails_closed() {
        let verifier = RecaptchaVerifier::new(RecaptchaConfig {
            secret: Some("secret".to_string()),
            verify_url: "http://127.0.0.1:9/siteverify".to_string(),
            timeout: Duration::from_millis(500),
            ..RecaptchaConfig::default()
        })
        .unwrap();
        let outcome = verifier.verify(Some("token"), Some("unknown")).await;
        assert!(!outcome.success);
        assert_eq!(outcome.error_codes, vec!["verification-failed"]);
    }
}
