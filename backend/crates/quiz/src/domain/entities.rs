//! Domain Entities
//!
//! Core business entities for the quiz domain.

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use kernel::id::QuizSessionId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::value_objects::RejectKind;

/// Lifecycle of a quiz session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionStatus::Active),
            "completed" => Ok(SessionStatus::Completed),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

/// QuizSession entity - one quiz attempt, created by start and closed by submit
#[derive(Debug, Clone)]
pub struct QuizSession {
    pub id: QuizSessionId,
    pub status: SessionStatus,
    /// Whole-second precision, so it agrees with the token `exp` claim
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl QuizSession {
    /// Create a new active session valid for `ttl` from `now`
    pub fn new(ttl: Duration, now: DateTime<Utc>) -> Self {
        let ttl = TimeDelta::from_std(Duration::from_secs(ttl.as_secs())).unwrap_or(TimeDelta::MAX);
        Self {
            id: QuizSessionId::new(),
            status: SessionStatus::Active,
            expires_at: now
                .trunc_subsecs(0)
                .checked_add_signed(ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            created_at: now,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Ok when the session can still accept a submission
    pub fn check_usable_at(&self, now: DateTime<Utc>) -> Result<(), RejectKind> {
        if self.status != SessionStatus::Active {
            return Err(RejectKind::SessionInvalid);
        }
        if self.is_expired_at(now) {
            return Err(RejectKind::SessionExpired);
        }
        Ok(())
    }
}

/// Question entity - read-only catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: i32,
    pub text: String,
    pub options: Vec<String>,
}

/// One answered question, in canonical order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEntry {
    pub question_id: i32,
    pub question_text: String,
    /// 1-based position of the question in the catalog
    pub question_number: u32,
    pub answer: String,
}

/// Answers document stored with a result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionAnswers {
    pub answers: Vec<AnswerEntry>,
    pub name: Option<String>,
    pub contact_method: Option<String>,
}

/// Lead payload forwarded to the CRM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrmLead {
    pub name: String,
    pub phone: String,
    pub utm_source: String,
    pub comments: String,
    #[serde(rename = "contactMethod")]
    pub contact_method: String,
}

/// Lead to enqueue alongside a result
#[derive(Debug, Clone)]
pub struct PendingLead {
    pub lead: CrmLead,
    /// Earliest time the outbox worker may pick the row up
    pub not_before: DateTime<Utc>,
}

/// Result row to persist, together with its session completion
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub session_id: QuizSessionId,
    pub phone: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub fingerprint_data: Option<serde_json::Value>,
    pub recaptcha_verified: bool,
    pub answers: SubmissionAnswers,
    /// None for bot records: they never reach the CRM
    pub crm_lead: Option<PendingLead>,
}

/// Ids assigned when a submission is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedSubmission {
    pub result_id: i64,
    pub outbox_id: Option<i64>,
}

/// Outbox row claimed for delivery
#[derive(Debug, Clone)]
pub struct CrmDelivery {
    pub id: i64,
    pub lead: CrmLead,
    /// Failed attempts so far
    pub attempts: i32,
}
