//! Quiz Router

use axum::{
    Router,
    routing::{get, post},
};
use platform::rate_limit::{DailyRateLimiter, MemoryRateLimitStore, RateLimitStore};
use std::sync::Arc;

use crate::application::config::QuizConfig;
use crate::application::session_token::SessionTokenCodec;
use crate::domain::ports::{CaptchaVerifier, CrmSink};
use crate::domain::repository::QuizRepository;
use crate::error::QuizResult;
use crate::infra::crm::HttpCrmClient;
use crate::infra::postgres::PgQuizRepository;
use crate::infra::recaptcha::RecaptchaVerifier;
use crate::presentation::handlers::{self, QuizAppState};

impl<R, V, C, L> QuizAppState<R, V, C, L>
where
    L: RateLimitStore,
{
    /// Assemble handler state; fails when the session secret is empty
    pub fn new(
        repo: R,
        captcha: V,
        crm: C,
        limiter: DailyRateLimiter<L>,
        config: QuizConfig,
    ) -> QuizResult<Self> {
        let tokens = SessionTokenCodec::new(&config.session_secret)?;
        Ok(Self {
            repo: Arc::new(repo),
            captcha: Arc::new(captcha),
            crm: Arc::new(crm),
            limiter: Arc::new(limiter),
            tokens: Arc::new(tokens),
            config: Arc::new(config),
        })
    }
}

/// Production state: PostgreSQL, reCAPTCHA, HTTP CRM, in-process rate limits
pub type PgQuizAppState =
    QuizAppState<PgQuizRepository, RecaptchaVerifier, HttpCrmClient, MemoryRateLimitStore>;

/// Create the quiz router with PostgreSQL repository
pub fn quiz_router(state: PgQuizAppState) -> Router {
    quiz_router_generic(state)
}

/// Create a generic quiz router for any repository and adapter implementation
pub fn quiz_router_generic<R, V, C, L>(state: QuizAppState<R, V, C, L>) -> Router
where
    R: QuizRepository,
    V: CaptchaVerifier + Send + Sync + 'static,
    C: CrmSink + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
{
    Router::new()
        .route("/start", post(handlers::start_session::<R, V, C, L>))
        .route("/submit", post(handlers::submit_quiz::<R, V, C, L>))
        .route("/questions", get(handlers::list_questions::<R, V, C, L>))
        .with_state(state)
}
