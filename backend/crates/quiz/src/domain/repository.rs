//! Repository Traits
//!
//! Interfaces for data persistence. Implementation is in infrastructure layer.

use chrono::{DateTime, Utc};
use kernel::id::QuizSessionId;
use std::time::Duration;

use crate::domain::entities::{
    CrmDelivery, NewSubmission, Question, QuizSession, RecordedSubmission,
};
use crate::error::QuizResult;

/// QuizSession repository trait
#[trait_variant::make(QuizSessionRepository: Send)]
pub trait LocalQuizSessionRepository {
    async fn create_session(&self, session: &QuizSession) -> QuizResult<()>;

    async fn find_session(&self, session_id: QuizSessionId) -> QuizResult<Option<QuizSession>>;
}

/// Question catalog (read-only)
#[trait_variant::make(QuestionRepository: Send)]
pub trait LocalQuestionRepository {
    /// All questions, ascending by id
    async fn list_questions(&self) -> QuizResult<Vec<Question>>;
}

/// Result persistence
#[trait_variant::make(SubmissionRepository: Send)]
pub trait LocalSubmissionRepository {
    /// Store the result, mark its session completed and enqueue its lead
    ///
    /// All three writes commit together or not at all. `None` when the session
    /// was no longer active, in which case nothing is written.
    async fn record_submission(
        &self,
        submission: &NewSubmission,
    ) -> QuizResult<Option<RecordedSubmission>>;
}

/// Pending CRM deliveries
#[trait_variant::make(CrmOutboxRepository: Send)]
pub trait LocalCrmOutboxRepository {
    /// Lease up to `limit` due rows that have fewer than `max_attempts` failures
    ///
    /// A claimed row is hidden from other claimers for `lease`.
    async fn claim_due_deliveries(
        &self,
        limit: u32,
        lease: Duration,
        max_attempts: u32,
    ) -> QuizResult<Vec<CrmDelivery>>;

    async fn mark_delivered(&self, delivery_id: i64) -> QuizResult<()>;

    /// Count a failed attempt and schedule the next one
    async fn mark_delivery_failed(
        &self,
        delivery_id: i64,
        error: &str,
        retry_at: DateTime<Utc>,
    ) -> QuizResult<()>;
}

/// Everything the HTTP layer needs from storage
pub trait QuizRepository:
    QuizSessionRepository
    + QuestionRepository
    + SubmissionRepository
    + CrmOutboxRepository
    + Send
    + Sync
    + 'static
{
}

impl<T> QuizRepository for T where
    T: QuizSessionRepository
        + QuestionRepository
        + SubmissionRepository
        + CrmOutboxRepository
        + Send
        + Sync
        + 'static
{
}
