//! Platform Crate - Technical Infrastructure
//!
//! Technical building blocks shared by the domain crates:
//! - Client context extraction (IP, User-Agent, bearer token)
//! - Cookie helpers
//! - Cryptographic utilities (HMAC-SHA256, Base64, secrets)
//! - Compact HS256 signed tokens
//! - Rate limiting (store trait, in-memory store, daily limiter)

pub mod client;
pub mod cookie;
pub mod crypto;
pub mod rate_limit;
pub mod token;
