//! Infrastructure Layer
//!
//! PostgreSQL storage and the HTTP adapters for CAPTCHA and CRM.

pub mod crm;
pub mod postgres;
pub mod recaptcha;
