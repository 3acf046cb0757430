//! Domain Layer - Business logic and entities
//!
//! This layer contains:
//! - Domain entities (QuizSession, Question, results and CRM leads)
//! - Domain value objects (reject kinds, token claims, CAPTCHA outcome)
//! - Fingerprint validation
//! - Domain services (answer ordering, bot detection, CRM comments)
//! - Repository traits and outbound ports (interfaces)

pub mod entities;
pub mod fingerprint;
pub mod ports;
pub mod repository;
pub mod services;
pub mod value_objects;
