//! Quiz Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, fingerprint validation, repository and port traits
//! - `application/` - Use cases (start, submit, questions, CRM delivery)
//! - `infra/` - PostgreSQL, reCAPTCHA and CRM implementations
//! - `presentation/` - HTTP handlers
//!
//! ## Admission Model
//! - A session is started first and handed out as a signed token bound to
//!   the client IP and User-Agent
//! - Submissions pass an ordered chain of gates; each ends in accept,
//!   record-as-bot or silent rejection
//! - The client sees the same response for every outcome; the reason is
//!   only in the server logs
//! - Accepted leads reach the CRM through a transactional outbox

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::config::{CaptchaFailurePolicy, FingerprintPolicy, QuizConfig};
pub use application::submit_quiz::Admission;
pub use error::{QuizError, QuizResult};
pub use infra::crm::{CrmConfig, HttpCrmClient};
pub use infra::postgres::PgQuizRepository;
pub use infra::recaptcha::{RecaptchaConfig, RecaptchaVerifier};
pub use presentation::handlers::QuizAppState;
pub use presentation::router::{PgQuizAppState, quiz_router, quiz_router_generic};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};
