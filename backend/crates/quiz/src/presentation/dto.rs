//! API DTOs (Data Transfer Objects)

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::application::submit_quiz::SubmissionBody;
use crate::domain::entities::Question;

/// Body of every submit response, whatever the outcome
pub const SUBMITTED_MESSAGE: &str = "Quiz submitted successfully.";
pub const STARTED_MESSAGE: &str = "Quiz session started.";

/// Response for POST /api/quiz/start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Request for POST /api/quiz/submit
///
/// Parsed leniently: fields of the wrong type are treated as absent and an
/// unparseable body as an empty submission.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmitRequest {
    pub answers: Option<Value>,
    pub name: Option<Value>,
    pub phone: Option<Value>,
    pub contact_method: Option<Value>,
    pub recaptcha_token: Option<Value>,
    pub fingerprint_data: Option<Value>,
    pub utm_source: Option<Value>,
}

impl SubmitRequest {
    pub fn from_body(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }

    pub fn into_submission(self) -> SubmissionBody {
        SubmissionBody {
            answers: match self.answers {
                Some(Value::Object(map)) => Some(map),
                _ => None,
            },
            name: text(self.name),
            phone: text(self.phone),
            contact_method: text(self.contact_method),
            captcha_token: text(self.recaptcha_token),
            fingerprint: self.fingerprint_data,
            utm_source: text(self.utm_source),
        }
    }
}

fn text(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

/// Response for POST /api/quiz/submit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub message: String,
}

impl SubmitResponse {
    pub fn submitted() -> Self {
        Self {
            message: SUBMITTED_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionDto {
    pub id: i32,
    pub text: String,
    pub options: Vec<String>,
}

impl From<Question> for QuestionDto {
    fn from(question: Question) -> Self {
        Self {
            id: question.id,
            text: question.text,
            options: question.options,
        }
    }
}

/// Response for GET /api/quiz/questions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionsResponse {
    pub questions: Vec<QuestionDto>,
}
