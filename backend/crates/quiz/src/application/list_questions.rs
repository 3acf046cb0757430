//! List Questions Use Case
//!
//! The question catalog is only served to clients holding a live session.

use chrono::Utc;
use kernel::id::QuizSessionId;
use std::sync::Arc;

use crate::domain::entities::Question;
use crate::domain::repository::{QuestionRepository, QuizSessionRepository};
use crate::error::{QuizError, QuizResult};

pub struct ListQuestionsUseCase<R>
where
    R: QuizSessionRepository + QuestionRepository,
{
    repo: Arc<R>,
}

impl<R> ListQuestionsUseCase<R>
where
    R: QuizSessionRepository + QuestionRepository,
{
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// `session_cookie` is the raw cookie value, if any
    pub async fn execute(&self, session_cookie: Option<&str>) -> QuizResult<Vec<Question>> {
        let raw = session_cookie
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(QuizError::SessionCookieMissing)?;

        let session_id: QuizSessionId = raw.parse().map_err(|_| QuizError::SessionInvalid)?;

        let session = self
            .repo
            .find_session(session_id)
            .await?
            .ok_or(QuizError::SessionInvalid)?;

        session
            .check_usable_at(Utc::now())
            .map_err(|_| QuizError::SessionInvalid)?;

        self.repo.list_questions().await
    }
}
