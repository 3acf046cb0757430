//! Environment configuration
//!
//! Every variable is optional except `DATABASE_URL` (and `QUIZ_SESSION_SECRET`
//! in release builds). Malformed values fail startup instead of falling back.

use anyhow::{Context, bail};
use platform::crypto::from_base64;
use platform::rate_limit::parse_whitelist;
use quiz::application::config::parse_user_agent_list;
use quiz::infra::crm::DEFAULT_CRM_BASE_URL;
use quiz::infra::recaptcha::DEFAULT_VERIFY_URL;
use quiz::{CrmConfig, QuizConfig, RecaptchaConfig};
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:31113";
const DEFAULT_FRONTEND_ORIGINS: &str = "http://localhost:40922,http://127.0.0.1:40922";

pub struct Settings {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub frontend_origins: Vec<String>,
    pub rate_limit_whitelist: Vec<String>,
    pub outbox_interval: Duration,
    pub quiz: QuizConfig,
    pub recaptcha: RecaptchaConfig,
    pub crm: CrmConfig,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            env::var("DATABASE_URL").context("DATABASE_URL must be set in environment")?;

        let bind_addr = var("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .context("BIND_ADDR is not a socket address")?;

        let frontend_origins = var("FRONTEND_ORIGINS")
            .unwrap_or_else(|| DEFAULT_FRONTEND_ORIGINS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            database_url,
            bind_addr,
            frontend_origins,
            rate_limit_whitelist: var("RATE_LIMIT_WHITELIST_IPS")
                .map(|raw| parse_whitelist(&raw))
                .unwrap_or_default(),
            outbox_interval: Duration::from_secs(parse_or("CRM_OUTBOX_INTERVAL_SECS", 30)?),
            quiz: quiz_config()?,
            recaptcha: recaptcha_config()?,
            crm: crm_config()?,
        })
    }
}

fn quiz_config() -> anyhow::Result<QuizConfig> {
    let defaults = QuizConfig::default();

    let session_secret = match var("QUIZ_SESSION_SECRET") {
        Some(raw) => decode_secret(&raw),
        None if cfg!(debug_assertions) => {
            tracing::warn!("QUIZ_SESSION_SECRET not set, using a random key for this process");
            QuizConfig::with_random_secret().session_secret
        }
        None => bail!("QUIZ_SESSION_SECRET must be set in production"),
    };

    Ok(QuizConfig {
        session_ttl: Duration::from_secs(parse_or("QUIZ_SESSION_TTL_SECS", 600)?),
        session_secret,
        cookie_secure: parse_or("COOKIE_SECURE", !cfg!(debug_assertions))?,
        start_daily_limit: parse_or("QUIZ_START_DAILY_LIMIT", defaults.start_daily_limit)?,
        submit_daily_limit: parse_or("QUIZ_SUBMIT_DAILY_LIMIT", defaults.submit_daily_limit)?,
        bot_user_agents: var("BOT_USER_AGENTS")
            .map(|raw| parse_user_agent_list(&raw))
            .unwrap_or_else(|| defaults.bot_user_agents.clone()),
        bot_response_delay: Duration::from_millis(parse_or("BOT_RESPONSE_DELAY_MS", 3000)?),
        fingerprint_policy: parse_or("FINGERPRINT_POLICY", defaults.fingerprint_policy)?,
        captcha_failure_policy: parse_or(
            "CAPTCHA_FAILURE_POLICY",
            defaults.captcha_failure_policy,
        )?,
        crm_utm_source: var("CRM_UTM_SOURCE").unwrap_or_else(|| defaults.crm_utm_source.clone()),
        crm_max_attempts: parse_or("CRM_OUTBOX_MAX_ATTEMPTS", defaults.crm_max_attempts)?,
        crm_outbox_batch: parse_or("CRM_OUTBOX_BATCH", defaults.crm_outbox_batch)?,
        ..defaults
    })
}

fn recaptcha_config() -> anyhow::Result<RecaptchaConfig> {
    let secret = var("RECAPTCHA_SECRET_KEY");
    if secret.is_none() {
        tracing::warn!("RECAPTCHA_SECRET_KEY not set, CAPTCHA verification is skipped");
    }

    Ok(RecaptchaConfig {
        secret,
        verify_url: var("RECAPTCHA_VERIFY_URL").unwrap_or_else(|| DEFAULT_VERIFY_URL.to_string()),
        min_score: parse_or("RECAPTCHA_MIN_SCORE", 0.5)?,
        timeout: Duration::from_millis(parse_or("RECAPTCHA_TIMEOUT_MS", 5000)?),
    })
}

fn crm_config() -> anyhow::Result<CrmConfig> {
    Ok(CrmConfig {
        base_url: var("CRM_BASE_URL").unwrap_or_else(|| DEFAULT_CRM_BASE_URL.to_string()),
        token: var("CRM_TOKEN")
            .or_else(|| var("TOKEN_CRM"))
            .or_else(|| var("CRM_TOKEN_ID")),
        timeout: Duration::from_millis(parse_or("CRM_TIMEOUT_MS", 15000)?),
    })
}

/// Non-blank value of an env var
fn var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{name} has an invalid value {raw:?}: {e}")),
        None => Ok(default),
    }
}

/// Standard base64 when it decodes, otherwise the raw bytes
fn decode_secret(raw: &str) -> Vec<u8> {
    from_base64(raw).unwrap_or_else(|_| raw.as_bytes().to_vec())
}
