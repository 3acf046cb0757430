//! Start Session Use Case

use chrono::Utc;
use kernel::id::QuizSessionId;
use platform::client::ClientContext;
use platform::rate_limit::{DailyRateLimiter, RateLimitStore};
use std::sync::Arc;

use crate::application::config::{QuizConfig, START_ROUTE};
use crate::application::session_token::SessionTokenCodec;
use crate::domain::entities::QuizSession;
use crate::domain::repository::QuizSessionRepository;
use crate::error::QuizResult;

/// Output of start session
#[derive(Debug, Clone)]
pub enum StartSessionOutput {
    Started {
        session_id: QuizSessionId,
        token: String,
    },
    /// Daily start quota exhausted; no session was created
    RateLimited,
}

/// Start Session Use Case
pub struct StartSessionUseCase<S, L>
where
    S: QuizSessionRepository,
    L: RateLimitStore,
{
    session_repo: Arc<S>,
    limiter: Arc<DailyRateLimiter<L>>,
    tokens: Arc<SessionTokenCodec>,
    config: Arc<QuizConfig>,
}

impl<S, L> StartSessionUseCase<S, L>
where
    S: QuizSessionRepository,
    L: RateLimitStore,
{
    pub fn new(
        session_repo: Arc<S>,
        limiter: Arc<DailyRateLimiter<L>>,
        tokens: Arc<SessionTokenCodec>,
        config: Arc<QuizConfig>,
    ) -> Self {
        Self {
            session_repo,
            limiter,
            tokens,
            config,
        }
    }

    pub async fn execute(&self, client: &ClientContext) -> QuizResult<StartSessionOutput> {
        let ip = client.ip_string();
        let quota = self
            .limiter
            .consume(START_ROUTE, ip.as_deref(), self.config.start_daily_limit)
            .await?;
        if !quota.is_allowed() {
            tracing::warn!(
                ip = ?ip,
                retry_after_secs = ?quota.retry_after_secs(),
                "Quiz start rate limited"
            );
            return Ok(StartSessionOutput::RateLimited);
        }

        let now = Utc::now();
        let session = QuizSession::new(self.config.session_ttl, now);
        self.session_repo.create_session(&session).await?;

        let token = self
            .tokens
            .issue(session.id, client, now, session.expires_at)?;

        tracing::info!(session_id = %session.id, "Quiz session started");

        Ok(StartSessionOutput::Started {
            session_id: session.id,
            token,
        })
    }
}
