//! Application Layer - Use Cases
//!
//! This layer orchestrates domain logic and infrastructure.
//! Contains use case implementations.

pub mod config;
pub mod deliver_leads;
pub mod list_questions;
pub mod session_token;
pub mod start_session;
pub mod submit_quiz;
