//! Submit Quiz Use Case
//!
//! Admission pipeline for quiz submissions. Gates run in a fixed order and
//! the first one that fails decides the outcome:
//!
//! 1. daily submit quota for the client IP
//! 2. bearer token present
//! 3. token signature and expiry
//! 4. token bound to the requesting IP and User-Agent
//! 5. session exists, is active and not expired
//! 6. fingerprint validation (policy: degrade or reject)
//! 7. User-Agent denylist (stored as a bot record)
//! 8. CAPTCHA (policy: reject or store as a bot record)
//! 9. contact fields present
//! 10. store the result, complete the session and enqueue the lead atomically
//! 11. one immediate CRM delivery attempt, in the background
//!
//! Every outcome is rendered identically to the client.

use chrono::{TimeDelta, Utc};
use kernel::id::QuizSessionId;
use platform::client::ClientContext;
use platform::rate_limit::{DailyRateLimiter, RateLimitStore};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::application::config::{
    CaptchaFailurePolicy, FingerprintPolicy, QuizConfig, SUBMIT_ROUTE,
};
use crate::application::deliver_leads::DeliverLeadsUseCase;
use crate::application::session_token::SessionTokenCodec;
use crate::domain::entities::{
    CrmDelivery, NewSubmission, PendingLead, QuizSession, SubmissionAnswers,
};
use crate::domain::fingerprint;
use crate::domain::ports::{CaptchaVerifier, CrmSink};
use crate::domain::repository::{
    CrmOutboxRepository, QuestionRepository, QuizSessionRepository, SubmissionRepository,
};
use crate::domain::services::{build_crm_lead, is_denied_user_agent, order_answers};
use crate::domain::value_objects::{BotReason, ContactDetails, RejectKind};
use crate::error::QuizResult;

/// Submission fields as sent by the client, all optional
#[derive(Debug, Clone, Default)]
pub struct SubmissionBody {
    pub answers: Option<Map<String, Value>>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub contact_method: Option<String>,
    pub captcha_token: Option<String>,
    pub fingerprint: Option<Value>,
    pub utm_source: Option<String>,
}

/// Input DTO for submit quiz
#[derive(Debug, Clone)]
pub struct SubmitQuizInput {
    pub bearer_token: Option<String>,
    pub client: ClientContext,
    pub body: SubmissionBody,
}

/// Outcome of the admission pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Accept {
        session_id: QuizSessionId,
        result_id: i64,
    },
    RecordAsBot {
        session_id: QuizSessionId,
        result_id: i64,
        reason: BotReason,
    },
    RejectSilently(RejectKind),
}

/// Submit Quiz Use Case
pub struct SubmitQuizUseCase<R, V, C, L>
where
    R: QuizSessionRepository
        + QuestionRepository
        + SubmissionRepository
        + CrmOutboxRepository
        + Send
        + Sync
        + 'static,
    V: CaptchaVerifier,
    C: CrmSink + Send + Sync + 'static,
    L: RateLimitStore,
{
    repo: Arc<R>,
    captcha: Arc<V>,
    crm: Arc<C>,
    limiter: Arc<DailyRateLimiter<L>>,
    tokens: Arc<SessionTokenCodec>,
    config: Arc<QuizConfig>,
}

impl<R, V, C, L> SubmitQuizUseCase<R, V, C, L>
where
    R: QuizSessionRepository
        + QuestionRepository
        + SubmissionRepository
        + CrmOutboxRepository
        + Send
        + Sync
        + 'static,
    V: CaptchaVerifier,
    C: CrmSink + Send + Sync + 'static,
    L: RateLimitStore,
{
    pub fn new(
        repo: Arc<R>,
        captcha: Arc<V>,
        crm: Arc<C>,
        limiter: Arc<DailyRateLimiter<L>>,
        tokens: Arc<SessionTokenCodec>,
        config: Arc<QuizConfig>,
    ) -> Self {
        Self {
            repo,
            captcha,
            crm,
            limiter,
            tokens,
            config,
        }
    }

    pub async fn execute(&self, input: SubmitQuizInput) -> QuizResult<Admission> {
        let ip = input.client.ip_string();
        let admission = self.admit(&input).await?;

        match &admission {
            Admission::Accept {
                session_id,
                result_id,
            } => {
                tracing::info!(
                    session_id = %session_id,
                    result_id = *result_id,
                    "Quiz submission accepted"
                );
            }
            Admission::RecordAsBot {
                session_id,
                result_id,
                reason,
            } => {
                tracing::warn!(
                    session_id = %session_id,
                    result_id = *result_id,
                    reason = reason.as_str(),
                    ip = ?ip,
                    user_agent = ?input.client.user_agent(),
                    "Quiz submission recorded as bot"
                );
            }
            Admission::RejectSilently(kind) => {
                tracing::warn!(
                    kind = kind.as_str(),
                    ip = ?ip,
                    "Quiz submission rejected"
                );
            }
        }

        Ok(admission)
    }

    async fn admit(&self, input: &SubmitQuizInput) -> QuizResult<Admission> {
        let client = &input.client;
        let body = &input.body;
        let ip = client.ip_string();

        let quota = self
            .limiter
            .consume(SUBMIT_ROUTE, ip.as_deref(), self.config.submit_daily_limit)
            .await?;
        if !quota.is_allowed() {
            tracing::debug!(retry_after_secs = ?quota.retry_after_secs(), "Submit quota exhausted");
            return Ok(Admission::RejectSilently(RejectKind::RateLimited));
        }

        let Some(token) = input.bearer_token.as_deref() else {
            return Ok(Admission::RejectSilently(RejectKind::Unauthenticated));
        };

        let Some(verified) = self.tokens.verify(token) else {
            return Ok(Admission::RejectSilently(RejectKind::InvalidToken));
        };

        if !verified.is_bound_to(client) {
            return Ok(Admission::RejectSilently(RejectKind::BindingMismatch));
        }

        let Some(session) = self.repo.find_session(verified.session_id).await? else {
            return Ok(Admission::RejectSilently(RejectKind::SessionInvalid));
        };
        if let Err(kind) = session.check_usable_at(Utc::now()) {
            return Ok(Admission::RejectSilently(kind));
        }

        let fingerprint_data = match body.fingerprint.as_ref().filter(|v| !v.is_null()) {
            None => None,
            Some(raw) => match fingerprint::validate(raw) {
                Ok(valid) => Some(valid.to_value()),
                Err(e) => {
                    tracing::warn!(
                        session_id = %session.id,
                        error = %e,
                        "Invalid fingerprint data"
                    );
                    match self.config.fingerprint_policy {
                        FingerprintPolicy::Strict => {
                            return Ok(Admission::RejectSilently(RejectKind::FingerprintInvalid));
                        }
                        FingerprintPolicy::Degrade => None,
                    }
                }
            },
        };

        if is_denied_user_agent(client.user_agent(), &self.config.bot_user_agents) {
            return self
                .record_as_bot(&session, input, fingerprint_data, BotReason::DeniedUserAgent)
                .await;
        }

        let captcha = self
            .captcha
            .verify(body.captcha_token.as_deref(), ip.as_deref())
            .await;
        if !captcha.success {
            tracing::warn!(
                session_id = %session.id,
                error_codes = ?captcha.error_codes,
                "CAPTCHA verification failed"
            );
            return match self.config.captcha_failure_policy {
                CaptchaFailurePolicy::Reject => {
                    Ok(Admission::RejectSilently(RejectKind::CaptchaFailed))
                }
                CaptchaFailurePolicy::Record => {
                    self.record_as_bot(&session, input, fingerprint_data, BotReason::CaptchaFailed)
                        .await
                }
            };
        }

        let (Some(submitted), Some(contact)) = (
            body.answers.as_ref(),
            ContactDetails::from_parts(
                body.name.as_deref(),
                body.phone.as_deref(),
                body.contact_method.as_deref(),
            ),
        ) else {
            return Ok(Admission::RejectSilently(RejectKind::MissingFields));
        };

        let questions = self.repo.list_questions().await?;
        let answers = order_answers(&questions, submitted);

        let utm_source = body
            .utm_source
            .as_deref()
            .map(str::trim)
            .filter(|utm| !utm.is_empty())
            .unwrap_or(self.config.crm_utm_source.as_str());
        let lead = build_crm_lead(&contact, &answers, utm_source);

        // The immediate attempt holds the row until the first backoff elapses.
        let lease = TimeDelta::from_std(self.config.crm_backoff(1)).unwrap_or(TimeDelta::MAX);
        let not_before = Utc::now()
            .checked_add_signed(lease)
            .unwrap_or(chrono::DateTime::<Utc>::MAX_UTC);

        let submission = NewSubmission {
            session_id: session.id,
            phone: Some(contact.phone.clone()),
            ip_address: ip.clone(),
            user_agent: client.user_agent().map(str::to_string),
            fingerprint_data,
            recaptcha_verified: captcha.success,
            answers: SubmissionAnswers {
                answers,
                name: Some(contact.name.clone()),
                contact_method: Some(contact.contact_method.clone()),
            },
            crm_lead: Some(PendingLead {
                lead: lead.clone(),
                not_before,
            }),
        };
        let Some(recorded) = self.repo.record_submission(&submission).await? else {
            return Ok(Admission::RejectSilently(RejectKind::SessionInvalid));
        };

        if let Some(outbox_id) = recorded.outbox_id {
            self.spawn_delivery(CrmDelivery {
                id: outbox_id,
                lead,
                attempts: 0,
            });
        }

        Ok(Admission::Accept {
            session_id: session.id,
            result_id: recorded.result_id,
        })
    }

    /// First delivery attempt for a committed lead, off the request path
    fn spawn_delivery(&self, delivery: CrmDelivery) {
        let deliverer =
            DeliverLeadsUseCase::new(self.repo.clone(), self.crm.clone(), self.config.clone());

        tokio::spawn(async move {
            // The result is committed; a storage error here only delays the lead.
            if let Err(e) = deliverer.attempt(&delivery).await {
                tracing::error!(
                    delivery_id = delivery.id,
                    error = %e,
                    "Could not record CRM delivery attempt"
                );
            }
        });
    }

    async fn record_as_bot(
        &self,
        session: &QuizSession,
        input: &SubmitQuizInput,
        fingerprint_data: Option<Value>,
        reason: BotReason,
    ) -> QuizResult<Admission> {
        let body = &input.body;
        let questions = self.repo.list_questions().await?;
        let answers = body
            .answers
            .as_ref()
            .map(|submitted| order_answers(&questions, submitted))
            .unwrap_or_default();

        let submission = NewSubmission {
            session_id: session.id,
            phone: non_blank(body.phone.as_deref()),
            ip_address: input.client.ip_string(),
            user_agent: input.client.user_agent().map(str::to_string),
            fingerprint_data,
            recaptcha_verified: false,
            answers: SubmissionAnswers {
                answers,
                name: non_blank(body.name.as_deref()),
                contact_method: non_blank(body.contact_method.as_deref()),
            },
            crm_lead: None,
        };
        let Some(recorded) = self.repo.record_submission(&submission).await? else {
            return Ok(Admission::RejectSilently(RejectKind::SessionInvalid));
        };

        // Slow automated clients down; the response is otherwise identical.
        tokio::time::sleep(self.config.bot_response_delay).await;

        Ok(Admission::RecordAsBot {
            session_id: session.id,
            result_id: recorded.result_id,
            reason,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
