//! Fixed-window boundary arithmetic.
//!
//! Every bucket runs its own window phase: a window starts at the request
//! that created or rolled the bucket over, not at a calendar boundary.

use serde::{Deserialize, Serialize};

/// Compute the absolute reset time (epoch millis) of a window starting at `now`.
///
/// Saturates at `i64::MAX`; a bucket reset there never rolls over, which no
/// real epoch-millisecond clock reaches.
pub fn compute_reset(now: i64, window_ms: u64) -> i64 {
    let window = i64::try_from(window_ms).unwrap_or(i64::MAX);
    now.saturating_add(window)
}

/// Whether a window ending at `reset_at` has elapsed at `now`.
pub fn is_expired(reset_at: i64, now: i64) -> bool {
    now >= reset_at
}

/// Whether a bucket has been idle past its window plus a grace period.
pub fn is_idle(reset_at: i64, idle_grace_ms: u64, now: i64) -> bool {
    compute_reset(reset_at, idle_grace_ms) < now
}

/// Named window lengths accepted in policy configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    /// Per-second rate limiting
    Second,
    /// Per-minute rate limiting
    Minute,
    /// Per-hour rate limiting
    Hour,
    /// Per-day rate limiting
    Day,
}

impl TimeWindow {
    /// Length of this window in milliseconds.
    pub fn as_millis(&self) -> u64 {
        match self {
            TimeWindow::Second => 1_000,
            TimeWindow::Minute => 60_000,
            TimeWindow::Hour => 3_600_000,
            TimeWindow::Day => 86_400_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_reset_has_no_calendar_alignment() {
        assert_eq!(compute_reset(0, 1000), 1000);
        assert_eq!(compute_reset(1001, 1000), 2001);
        assert_eq!(compute_reset(1_700_000_000_123, 60_000), 1_700_000_060_123);
    }

    #[test]
    fn test_compute_reset_saturates() {
        assert_eq!(compute_reset(i64::MAX - 1, 10), i64::MAX);
        assert_eq!(compute_reset(0, u64::MAX), i64::MAX);
    }

    #[test]
    fn test_is_expired_boundary() {
        assert!(!is_expired(1000, 999));
        assert!(is_expired(1000, 1000));
        assert!(is_expired(1000, 1001));
    }

    #[test]
    fn test_is_idle_requires_grace_to_pass() {
        assert!(!is_idle(1000, 500, 1500));
        assert!(is_idle(1000, 500, 1501));
        assert!(is_idle(1000, 0, 1001));
    }

    #[test]
    fn test_time_window_millis() {
        assert_eq!(TimeWindow::Second.as_millis(), 1_000);
        assert_eq!(TimeWindow::Minute.as_millis(), 60_000);
        assert_eq!(TimeWindow::Hour.as_millis(), 3_600_000);
        assert_eq!(TimeWindow::Day.as_millis(), 86_400_000);
    }
}
