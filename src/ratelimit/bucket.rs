//! Per-subject quota state.

use serde::Serialize;

use super::window;

/// The quota state for one subject within its current window.
///
/// `count` has no public setter; the only way to change it is
/// [`Bucket::try_admit`], which store implementations call while holding
/// whatever per-token exclusion they provide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    token: String,
    count: u64,
    limit: u64,
    reset_at: i64,
}

impl Bucket {
    /// Create an empty bucket whose window ends at `reset_at`.
    pub fn new(token: impl Into<String>, limit: u64, reset_at: i64) -> Self {
        Self {
            token: token.into(),
            count: 0,
            limit,
            reset_at,
        }
    }

    /// Roll the window over if it has elapsed, then admit one request if
    /// there is room.
    ///
    /// Returns `true` when the request was admitted. A rejection leaves
    /// `count` untouched. On rollover the caller's `limit` replaces the
    /// stored one; mid-window the stored limit keeps applying.
    pub fn try_admit(&mut self, limit: u64, window_ms: u64, now: i64) -> bool {
        if window::is_expired(self.reset_at, now) {
            self.count = 0;
            self.limit = limit;
            self.reset_at = window::compute_reset(now, window_ms);
        }

        if self.count < self.limit {
            self.count += 1;
            true
        } else {
            false
        }
    }

    /// The subject this bucket belongs to.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Requests admitted in the current window.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Maximum admissions for the current window.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Epoch millis at which the current window ends.
    pub fn reset_at(&self) -> i64 {
        self.reset_at
    }

    /// Admissions left in the current window.
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_bucket_is_empty() {
        let bucket = Bucket::new("x", 3, 1000);
        assert_eq!(bucket.token(), "x");
        assert_eq!(bucket.count(), 0);
        assert_eq!(bucket.remaining(), 3);
    }

    #[test]
    fn test_admit_until_limit() {
        let mut bucket = Bucket::new("x", 2, 1000);

        assert!(bucket.try_admit(2, 1000, 0));
        assert!(bucket.try_admit(2, 1000, 1));
        assert!(!bucket.try_admit(2, 1000, 2));
        assert_eq!(bucket.count(), 2);
        assert_eq!(bucket.remaining(), 0);
    }

    #[test]
    fn test_rejection_does_not_count() {
        let mut bucket = Bucket::new("x", 1, 1000);
        bucket.try_admit(1, 1000, 0);

        for t in 1..10 {
            assert!(!bucket.try_admit(1, 1000, t));
        }
        assert_eq!(bucket.count(), 1);
    }

    #[test]
    fn test_rollover_recomputes_reset_and_limit() {
        let mut bucket = Bucket::new("x", 1, 1000);
        bucket.try_admit(1, 1000, 0);

        // One millisecond before the reset the window is still full
        assert!(!bucket.try_admit(1, 1000, 999));

        assert!(bucket.try_admit(5, 1000, 1000));
        assert_eq!(bucket.count(), 1);
        assert_eq!(bucket.limit(), 5);
        assert_eq!(bucket.reset_at(), 2000);
    }

    #[test]
    fn test_limit_change_mid_window_waits_for_rollover() {
        let mut bucket = Bucket::new("x", 1, 1000);
        bucket.try_admit(1, 1000, 0);

        assert!(!bucket.try_admit(10, 1000, 500));
        assert_eq!(bucket.limit(), 1);
    }
}
