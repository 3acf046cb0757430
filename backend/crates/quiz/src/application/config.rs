//! Application Configuration
//!
//! Configuration for the quiz application layer.

use std::str::FromStr;
use std::time::Duration;

/// Re-export SameSite from platform
pub use platform::cookie::SameSite;

/// Rate limit route for session starts
pub const START_ROUTE: &str = "quiz:start";
/// Rate limit route for submissions
pub const SUBMIT_ROUTE: &str = "quiz:submit";

/// What to do with a fingerprint that fails validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FingerprintPolicy {
    /// Store the submission without fingerprint data
    #[default]
    Degrade,
    /// Reject the submission
    Strict,
}

impl FromStr for FingerprintPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "degrade" => Ok(FingerprintPolicy::Degrade),
            "strict" => Ok(FingerprintPolicy::Strict),
            other => Err(format!("unknown fingerprint policy: {other}")),
        }
    }
}

/// What to do when CAPTCHA verification fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptchaFailurePolicy {
    /// Drop the submission
    #[default]
    Reject,
    /// Store it as a bot record
    Record,
}

impl FromStr for CaptchaFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(CaptchaFailurePolicy::Reject),
            "record" => Ok(CaptchaFailurePolicy::Record),
            other => Err(format!("unknown captcha failure policy: {other}")),
        }
    }
}

/// Quiz application configuration
#[derive(Debug, Clone)]
pub struct QuizConfig {
    /// Session and token lifetime
    pub session_ttl: Duration,
    /// Cookie carrying the session id
    pub session_cookie_name: String,
    /// Key for session token signatures
    pub session_secret: Vec<u8>,
    /// Whether to require Secure cookie
    pub cookie_secure: bool,
    /// SameSite policy
    pub cookie_same_site: SameSite,
    /// Session starts per client per day
    pub start_daily_limit: u32,
    /// Submissions per client per day
    pub submit_daily_limit: u32,
    /// Exact User-Agent strings treated as bots
    pub bot_user_agents: Vec<String>,
    /// Artificial delay before answering a bot
    pub bot_response_delay: Duration,
    pub fingerprint_policy: FingerprintPolicy,
    pub captcha_failure_policy: CaptchaFailurePolicy,
    /// `utm_source` for leads that don't carry their own
    pub crm_utm_source: String,
    /// Base delay between CRM delivery attempts (grows linearly)
    pub crm_retry_delay: Duration,
    /// Failed attempts after which a lead is left alone
    pub crm_max_attempts: u32,
    /// Rows claimed per outbox drain
    pub crm_outbox_batch: u32,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            session_ttl: Duration::from_secs(600),
            session_cookie_name: "sessionId".to_string(),
            session_secret: Vec::new(),
            cookie_secure: true,
            cookie_same_site: SameSite::Lax,
            start_daily_limit: 14,
            submit_daily_limit: 14,
            bot_user_agents: default_bot_user_agents(),
            bot_response_delay: Duration::from_secs(3),
            fingerprint_policy: FingerprintPolicy::default(),
            captcha_failure_policy: CaptchaFailurePolicy::default(),
            crm_utm_source: "quiz".to_string(),
            crm_retry_delay: Duration::from_secs(60),
            crm_max_attempts: 10,
            crm_outbox_batch: 20,
        }
    }
}

impl QuizConfig {
    /// Create config with a random session secret (for development)
    pub fn with_random_secret() -> Self {
        Self {
            session_secret: platform::crypto::random_bytes(32),
            ..Default::default()
        }
    }

    /// Create config for development (insecure cookie)
    pub fn development() -> Self {
        Self {
            cookie_secure: false,
            ..Self::with_random_secret()
        }
    }

    pub fn cookie(&self) -> platform::cookie::CookieConfig {
        platform::cookie::CookieConfig {
            same_site: self.cookie_same_site,
            ..platform::cookie::CookieConfig::new(&self.session_cookie_name, self.cookie_secure)
        }
    }

    /// Linear backoff: the n-th failure waits n times the base delay
    pub fn crm_backoff(&self, failed_attempts: u32) -> Duration {
        self.crm_retry_delay.saturating_mul(failed_attempts.max(1))
    }
}

/// User-Agent strings of known automation clients
pub fn default_bot_user_agents() -> Vec<String> {
    [
        "curl/7.68.0",
        "python-requests/2.31.0",
        "Go-http-client/1.1",
        "Wget/1.21.2",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) HeadlessChrome/124.0.0.0 Safari/537.36",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

/// Split a `|`-separated User-Agent list
pub fn parse_user_agent_list(raw: &str) -> Vec<String> {
    raw.split('|')
        .map(str::trim)
        .filter(|ua| !ua.is_empty())
        .map(str::to_string)
        .collect()
}
