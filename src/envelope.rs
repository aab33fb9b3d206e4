//! The success/failure envelope shared by every protected operation.
//!
//! Serialized shapes:
//!
//! ```json
//! {"success": true, "data": {...}}
//! {"success": false, "error": "rate limit exceeded", "code": "RATE_LIMIT_EXCEEDED",
//!  "quota": {"admitted": false, "count": 3, "limit": 3, "resetAt": 1000}}
//! ```

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::error::{Result, TurnstileError};
use crate::ratelimit::LimitVerdict;

/// Message carried by every rate limit rejection.
///
/// HTTP layers may match on it (or on [`RATE_LIMIT_EXCEEDED`]) to answer 429.
pub const RATE_LIMIT_MESSAGE: &str = "rate limit exceeded";

/// Failure code for a rejected request.
pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";

/// A failed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Human-readable description
    pub error: String,
    /// Stable machine-readable code
    pub code: String,
    /// Quota state, present when the failure came from the limiter
    pub quota: Option<LimitVerdict>,
}

/// Outcome of an operation: success with data, or a described failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The operation succeeded
    Success(T),
    /// The operation failed or was not allowed to run
    Failure(Failure),
}

impl<T> Outcome<T> {
    /// A successful outcome.
    pub fn success(data: T) -> Self {
        Outcome::Success(data)
    }

    /// A failure with no quota information.
    pub fn failure(code: impl Into<String>, error: impl Into<String>) -> Self {
        Outcome::Failure(Failure {
            error: error.into(),
            code: code.into(),
            quota: None,
        })
    }

    /// A rejection by the limiter.
    pub fn rate_limited(verdict: LimitVerdict) -> Self {
        Outcome::Failure(Failure {
            error: RATE_LIMIT_MESSAGE.to_string(),
            code: RATE_LIMIT_EXCEEDED.to_string(),
            quota: Some(verdict),
        })
    }

    /// A failure describing a core error.
    pub fn from_error(err: &TurnstileError) -> Self {
        Self::failure(err.kind(), err.to_string())
    }

    /// Whether this is the success variant.
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Whether this is a limiter rejection.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Outcome::Failure(f) if f.code == RATE_LIMIT_EXCEEDED)
    }

    /// Convert into a standard `Result`.
    pub fn into_result(self) -> std::result::Result<T, Failure> {
        match self {
            Outcome::Success(data) => Ok(data),
            Outcome::Failure(failure) => Err(failure),
        }
    }
}

impl From<LimitVerdict> for Outcome<LimitVerdict> {
    fn from(verdict: LimitVerdict) -> Self {
        if verdict.admitted {
            Outcome::Success(verdict)
        } else {
            Outcome::rate_limited(verdict)
        }
    }
}

impl From<Result<LimitVerdict>> for Outcome<LimitVerdict> {
    fn from(result: Result<LimitVerdict>) -> Self {
        match result {
            Ok(verdict) => verdict.into(),
            Err(e) => Outcome::from_error(&e),
        }
    }
}

impl<T: Serialize> Serialize for Outcome<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Outcome::Success(data) => {
                let mut state = serializer.serialize_struct("Outcome", 2)?;
                state.serialize_field("success", &true)?;
                state.serialize_field("data", data)?;
                state.end()
            }
            Outcome::Failure(failure) => {
                let mut state = serializer.serialize_struct("Outcome", 4)?;
                state.serialize_field("success", &false)?;
                state.serialize_field("error", &failure.error)?;
                state.serialize_field("code", &failure.code)?;
                match &failure.quota {
                    Some(quota) => state.serialize_field("quota", quota)?,
                    None => state.skip_field("quota")?,
                }
                state.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn verdict(admitted: bool, count: u64) -> LimitVerdict {
        LimitVerdict {
            admitted,
            count,
            limit: 3,
            reset_at: 1000,
        }
    }

    #[test]
    fn test_admitted_verdict_is_success_with_fields() {
        let outcome: Outcome<LimitVerdict> = verdict(true, 1).into();

        assert!(outcome.is_success());
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({
                "success": true,
                "data": {"admitted": true, "count": 1, "limit": 3, "resetAt": 1000}
            })
        );
    }

    #[test]
    fn test_rejected_verdict_is_failure_with_fields() {
        let outcome: Outcome<LimitVerdict> = verdict(false, 3).into();

        assert!(outcome.is_rate_limited());
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({
                "success": false,
                "error": "rate limit exceeded",
                "code": "RATE_LIMIT_EXCEEDED",
                "quota": {"admitted": false, "count": 3, "limit": 3, "resetAt": 1000}
            })
        );
    }

    #[test]
    fn test_store_error_is_distinct_from_rejection() {
        let result: Result<LimitVerdict> =
            Err(TurnstileError::StoreUnavailable("cache down".to_string()));
        let outcome: Outcome<LimitVerdict> = result.into();

        assert!(!outcome.is_success());
        assert!(!outcome.is_rate_limited());
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({
                "success": false,
                "error": "Bucket store unavailable: cache down",
                "code": "STORE_UNAVAILABLE"
            })
        );
    }

    #[test]
    fn test_into_result() {
        assert_eq!(Outcome::success(5).into_result(), Ok(5));

        let failure = Outcome::<i32>::failure("X", "boom").into_result().unwrap_err();
        assert_eq!(failure.code, "X");
        assert_eq!(failure.error, "boom");
    }
}
