//! Domain Services
//!
//! Pure functions over quiz entities.

use serde_json::{Map, Value};

use crate::domain::entities::{AnswerEntry, CrmLead, Question};
use crate::domain::value_objects::ContactDetails;

/// Order submitted answers by the question catalog
///
/// `questions` must already be in canonical order (ascending id). Answers are
/// keyed by the question id as a string; only non-blank string or numeric
/// answers count. Keys for unknown questions are ignored.
pub fn order_answers(questions: &[Question], submitted: &Map<String, Value>) -> Vec<AnswerEntry> {
    questions
        .iter()
        .enumerate()
        .filter_map(|(index, question)| {
            let answer = submitted
                .get(&question.id.to_string())
                .and_then(answer_text)?;
            Some(AnswerEntry {
                question_id: question.id,
                question_text: question.text.clone(),
                question_number: u32::try_from(index + 1).unwrap_or(u32::MAX),
                answer,
            })
        })
        .collect()
}

fn answer_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Exact, case-sensitive match against the configured denylist
pub fn is_denied_user_agent(user_agent: Option<&str>, denylist: &[String]) -> bool {
    match user_agent {
        Some(ua) => denylist.iter().any(|denied| denied == ua),
        None => false,
    }
}

/// One `<number>. <question>: <answer>` line per answer
pub fn crm_comments(answers: &[AnswerEntry]) -> String {
    answers
        .iter()
        .map(|entry| {
            format!(
                "{}. {}: {}",
                entry.question_number, entry.question_text, entry.answer
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_crm_lead(contact: &ContactDetails, answers: &[AnswerEntry], utm_source: &str) -> CrmLead {
    CrmLead {
        name: contact.name.clone(),
        phone: contact.phone.clone(),
        utm_source: utm_source.to_string(),
        comments: crm_comments(answers),
        contact_method: contact.contact_method.clone(),
    }
}
