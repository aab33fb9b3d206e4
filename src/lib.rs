//! Turnstile - Per-Subject Request Quotas
//!
//! This crate enforces fixed-window request quotas for subjects such as
//! client IPs, user ids or API keys. Each check is a single atomic
//! admit-or-reject decision against the subject's bucket, safe under many
//! concurrent callers, and its result is reported through a shared
//! success/failure envelope.

pub mod config;
pub mod envelope;
pub mod error;
pub mod ratelimit;

pub use envelope::Outcome;
pub use error::{Result, TurnstileError};
pub use ratelimit::{LimitVerdict, Limiter};
