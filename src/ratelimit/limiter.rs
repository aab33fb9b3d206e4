//! Core rate limiter implementation.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use super::bucket::Bucket;
use super::clock::{Clock, SystemClock};
use super::rules::{Policy, PolicySet};
use super::store::{BucketStore, InMemoryBucketStore};
use super::subject::SubjectKey;
use crate::envelope::Outcome;
use crate::error::{Result, TurnstileError};

/// The outcome of one quota check.
///
/// `admitted == false` is the normal "rate limit exceeded" result, not an
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitVerdict {
    /// Whether the request may proceed
    pub admitted: bool,
    /// Admissions in the current window, including this one if admitted
    pub count: u64,
    /// Maximum admissions for the current window
    pub limit: u64,
    /// Epoch millis at which the current window ends
    pub reset_at: i64,
}

impl LimitVerdict {
    fn from_bucket(admitted: bool, bucket: &Bucket) -> Self {
        Self {
            admitted,
            count: bucket.count(),
            limit: bucket.limit(),
            reset_at: bucket.reset_at(),
        }
    }

    /// Admissions left in the current window.
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.count)
    }

    /// Milliseconds until the window resets, zero if it already has.
    pub fn retry_after_ms(&self, now: i64) -> u64 {
        u64::try_from(self.reset_at.saturating_sub(now)).unwrap_or(0)
    }

    /// Standard rate limit response headers.
    ///
    /// `X-RateLimit-Reset` is in epoch seconds. `Retry-After` is only present
    /// on rejection and is at least one second.
    pub fn headers(&self, now: i64) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("X-RateLimit-Limit", self.limit.to_string()),
            ("X-RateLimit-Remaining", self.remaining().to_string()),
            ("X-RateLimit-Reset", ceil_div(self.reset_at, 1000).to_string()),
        ];

        if !self.admitted {
            let secs = ceil_div(self.retry_after_ms(now) as i64, 1000).max(1);
            headers.push(("Retry-After", secs.to_string()));
        }

        headers
    }
}

fn ceil_div(value: i64, divisor: i64) -> i64 {
    let quotient = value.div_euclid(divisor);
    if value.rem_euclid(divisor) == 0 {
        quotient
    } else {
        quotient + 1
    }
}

/// What a guarded operation does when the bucket store is unavailable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Let the request through
    FailOpen,
    /// Report the store failure and skip the operation
    #[default]
    FailClosed,
}

/// The public quota entry point.
///
/// A limiter owns one store and one clock. Construct it once and share it
/// (`Arc<Limiter>`) between request handlers; tests build their own with an
/// isolated store and a [`ManualClock`](super::ManualClock).
pub struct Limiter<S = InMemoryBucketStore, C = SystemClock> {
    /// Bucket storage
    store: Arc<S>,
    /// Time source for window decisions
    clock: C,
    /// Named policies for `check_policy`
    policies: RwLock<PolicySet>,
}

impl Limiter {
    /// Create a limiter over a fresh in-memory store and the system clock.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryBucketStore::new()), SystemClock)
    }
}

impl<S: BucketStore, C: Clock> Limiter<S, C> {
    /// Create a limiter over the given store and clock.
    pub fn new(store: Arc<S>, clock: C) -> Self {
        Self {
            store,
            clock,
            policies: RwLock::new(PolicySet::new()),
        }
    }

    /// Create a limiter with a set of named policies.
    pub fn with_policies(store: Arc<S>, clock: C, policies: PolicySet) -> Self {
        Self {
            store,
            clock,
            policies: RwLock::new(policies),
        }
    }

    /// Replace the named policies.
    pub fn set_policies(&self, policies: PolicySet) {
        let mut current = self.policies.write();
        *current = policies;
    }

    /// Get the current named policies.
    pub fn policies(&self) -> PolicySet {
        self.policies.read().clone()
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Current time according to this limiter's clock.
    pub fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Check and count one request for `token`.
    ///
    /// Fails with `InvalidConfiguration` before touching the store if
    /// `limit` or `window_ms` is not positive, and with `StoreUnavailable`
    /// if the store cannot be reached.
    pub async fn check(&self, token: &str, limit: i64, window_ms: i64) -> Result<LimitVerdict> {
        let policy = Policy::new(limit, window_ms).map_err(|e| {
            warn!(token = %token, limit = limit, window_ms = window_ms, "Rejected invalid quota parameters");
            e
        })?;
        self.check_validated(token, policy).await
    }

    /// Check a subject key against the given limit and window.
    pub async fn check_subject(
        &self,
        subject: &SubjectKey,
        limit: i64,
        window_ms: i64,
    ) -> Result<LimitVerdict> {
        self.check(&subject.to_token(), limit, window_ms).await
    }

    /// Check `token` against a named policy.
    pub async fn check_policy(&self, token: &str, name: &str) -> Result<LimitVerdict> {
        let found = self.policies.read().get(name);
        let policy = found.ok_or_else(|| {
            TurnstileError::InvalidConfiguration(format!("unknown policy '{}'", name))
        })?;
        self.check_validated(token, policy).await
    }

    async fn check_validated(&self, token: &str, policy: Policy) -> Result<LimitVerdict> {
        let now = self.clock.now_millis();

        trace!(
            token = %token,
            limit = policy.limit,
            window_ms = policy.window_ms,
            now = now,
            "Checking quota"
        );

        let (admitted, bucket) = self
            .store
            .try_consume(token, policy.limit, policy.window_ms, now)
            .await
            .map_err(|e| {
                warn!(token = %token, error = %e, "Bucket store failed during check");
                e
            })?;

        if !admitted {
            debug!(
                token = %token,
                count = bucket.count(),
                limit = bucket.limit(),
                reset_at = bucket.reset_at(),
                "Rate limit exceeded"
            );
        }

        Ok(LimitVerdict::from_bucket(admitted, &bucket))
    }

    /// Run `op` only if `token` is admitted, reporting every outcome through
    /// the shared envelope.
    ///
    /// A store failure runs the operation under [`FailurePolicy::FailOpen`]
    /// and reports `STORE_UNAVAILABLE` under [`FailurePolicy::FailClosed`].
    pub async fn guard<T, E, F, Fut>(
        &self,
        token: &str,
        limit: i64,
        window_ms: i64,
        on_store_failure: FailurePolicy,
        op: F,
    ) -> Outcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Display,
    {
        match self.check(token, limit, window_ms).await {
            Ok(verdict) if verdict.admitted => {}
            Ok(verdict) => return Outcome::rate_limited(verdict),
            Err(TurnstileError::StoreUnavailable(reason))
                if on_store_failure == FailurePolicy::FailOpen =>
            {
                warn!(token = %token, reason = %reason, "Bucket store unavailable, failing open");
            }
            Err(e) => return Outcome::from_error(&e),
        }

        match op().await {
            Ok(data) => Outcome::success(data),
            Err(e) => Outcome::failure("OPERATION_FAILED", e.to_string()),
        }
    }

    /// Forget buckets idle for longer than their window plus `idle_grace_ms`.
    pub async fn sweep(&self, idle_grace_ms: u64) -> Result<usize> {
        let now = self.clock.now_millis();
        let removed = self.store.sweep_expired(now, idle_grace_ms).await?;

        if removed > 0 {
            info!(removed = removed, idle_grace_ms = idle_grace_ms, "Swept idle buckets");
        } else {
            trace!("Sweep found no idle buckets");
        }

        Ok(removed)
    }
}
