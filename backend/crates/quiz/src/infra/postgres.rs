//! PostgreSQL Repository Implementations

use chrono::{DateTime, TimeDelta, Utc};
use kernel::id::QuizSessionId;
use sqlx::PgPool;
use sqlx::types::Json;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::entities::{
    CrmDelivery, CrmLead, NewSubmission, Question, QuizSession, RecordedSubmission,
    SessionStatus,
};
use crate::domain::repository::{
    CrmOutboxRepository, QuestionRepository, QuizSessionRepository, SubmissionRepository,
};
use crate::error::{QuizError, QuizResult};

/// PostgreSQL-backed repository
#[derive(Clone)]
pub struct PgQuizRepository {
    pool: PgPool,
}

impl PgQuizRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl QuizSessionRepository for PgQuizRepository {
    async fn create_session(&self, session: &QuizSession) -> QuizResult<()> {
        sqlx::query(
            r#"
            INSERT INTO quiz_sessions (
                quiz_session_id,
                status,
                expires_at,
                created_at
            ) VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(session.id.into_uuid())
        .bind(session.status.as_str())
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(session_id = %session.id, "Quiz session created");

        Ok(())
    }

    async fn find_session(&self, session_id: QuizSessionId) -> QuizResult<Option<QuizSession>> {
        let row = sqlx::query_as::<_, QuizSessionRow>(
            r#"
            SELECT
                quiz_session_id,
                status,
                expires_at,
                created_at
            FROM quiz_sessions
            WHERE quiz_session_id = $1
            "#,
        )
        .bind(session_id.into_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(QuizSessionRow::into_session).transpose()
    }
}

impl QuestionRepository for PgQuizRepository {
    async fn list_questions(&self) -> QuizResult<Vec<Question>> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT question_id, question_text, options
            FROM questions
            ORDER BY question_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(QuestionRow::into_question).collect())
    }
}

impl SubmissionRepository for PgQuizRepository {
    async fn record_submission(
        &self,
        submission: &NewSubmission,
    ) -> QuizResult<Option<RecordedSubmission>> {
        let mut tx = self.pool.begin().await?;

        // Row lock on the session serializes concurrent submits for one token.
        let completed = sqlx::query(
            r#"
            UPDATE quiz_sessions
            SET status = $2
            WHERE quiz_session_id = $1
              AND status = $3
            "#,
        )
        .bind(submission.session_id.into_uuid())
        .bind(SessionStatus::Completed.as_str())
        .bind(SessionStatus::Active.as_str())
        .execute(&mut *tx)
        .await?;

        if completed.rows_affected() == 0 {
            tx.rollback().await?;
            tracing::debug!(
                session_id = %submission.session_id,
                "Session no longer active, submission not stored"
            );
            return Ok(None);
        }

        let result_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO quiz_results (
                quiz_session_id,
                phone,
                ip_address,
                user_agent,
                fingerprint_data,
                recaptcha_verified,
                answers
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING quiz_result_id
            "#,
        )
        .bind(submission.session_id.into_uuid())
        .bind(submission.phone.as_deref())
        .bind(submission.ip_address.as_deref())
        .bind(submission.user_agent.as_deref())
        .bind(submission.fingerprint_data.as_ref().map(Json))
        .bind(submission.recaptcha_verified)
        .bind(Json(&submission.answers))
        .fetch_one(&mut *tx)
        .await?;

        let outbox_id = match &submission.crm_lead {
            Some(pending) => Some(
                sqlx::query_scalar::<_, i64>(
                    r#"
                    INSERT INTO crm_outbox (
                        quiz_result_id,
                        payload,
                        next_attempt_at
                    ) VALUES ($1, $2, $3)
                    RETURNING crm_outbox_id
                    "#,
                )
                .bind(result_id)
                .bind(Json(&pending.lead))
                .bind(pending.not_before)
                .fetch_one(&mut *tx)
                .await?,
            ),
            None => None,
        };

        tx.commit().await?;

        tracing::debug!(
            session_id = %submission.session_id,
            result_id = result_id,
            outbox_id = ?outbox_id,
            "Quiz result stored"
        );

        Ok(Some(RecordedSubmission {
            result_id,
            outbox_id,
        }))
    }
}

impl CrmOutboxRepository for PgQuizRepository {
    async fn claim_due_deliveries(
        &self,
        limit: u32,
        lease: Duration,
        max_attempts: u32,
    ) -> QuizResult<Vec<CrmDelivery>> {
        let lease = TimeDelta::from_std(lease)
            .map_err(|e| QuizError::Configuration(format!("outbox lease: {e}")))?;
        let lease_until = Utc::now() + lease;

        let rows = sqlx::query_as::<_, CrmOutboxRow>(
            r#"
            UPDATE crm_outbox
            SET next_attempt_at = $1
            WHERE crm_outbox_id IN (
                SELECT crm_outbox_id
                FROM crm_outbox
                WHERE delivered_at IS NULL
                  AND next_attempt_at <= now()
                  AND attempts < $2
                ORDER BY next_attempt_at
                LIMIT $3
                FOR UPDATE SKIP LOCKED
            )
            RETURNING crm_outbox_id, payload, attempts
            "#,
        )
        .bind(lease_until)
        .bind(i32::try_from(max_attempts).unwrap_or(i32::MAX))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CrmOutboxRow::into_delivery).collect())
    }

    async fn mark_delivered(&self, delivery_id: i64) -> QuizResult<()> {
        sqlx::query(
            r#"
            UPDATE crm_outbox
            SET delivered_at = now(), last_error = NULL
            WHERE crm_outbox_id = $1
            "#,
        )
        .bind(delivery_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_delivery_failed(
        &self,
        delivery_id: i64,
        error: &str,
        retry_at: DateTime<Utc>,
    ) -> QuizResult<()> {
        sqlx::query(
            r#"
            UPDATE crm_outbox
            SET attempts = attempts + 1,
                last_error = $2,
                next_attempt_at = $3
            WHERE crm_outbox_id = $1
            "#,
        )
        .bind(delivery_id)
        .bind(error)
        .bind(retry_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// Internal row types for sqlx mapping
#[derive(sqlx::FromRow)]
struct QuizSessionRow {
    quiz_session_id: Uuid,
    status: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl QuizSessionRow {
    fn into_session(self) -> QuizResult<QuizSession> {
        Ok(QuizSession {
            id: QuizSessionId::from_uuid(self.quiz_session_id),
            status: self.status.parse().map_err(QuizError::Internal)?,
            expires_at: self.expires_at,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct QuestionRow {
    question_id: i32,
    question_text: String,
    options: Json<Vec<String>>,
}

impl QuestionRow {
    fn into_question(self) -> Question {
        Question {
            id: self.question_id,
            text: self.question_text,
            options: self.options.0,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CrmOutboxRow {
    crm_outbox_id: i64,
    payload: Json<CrmLead>,
    attempts: i32,
}

impl CrmOutboxRow {
    fn into_delivery(self) -> CrmDelivery {
        CrmDelivery {
            id: self.crm_outbox_id,
            lead: self.payload.0,
            attempts: self.attempts,
        }
    }
}
