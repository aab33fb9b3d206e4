//! Bucket storage backends.

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, trace};

use super::bucket::Bucket;
use super::window;
use crate::error::Result;

/// Owner of all bucket records.
///
/// Implementations must run [`BucketStore::try_consume`] as one atomic unit
/// per token: lookup, rollover and increment may not interleave with another
/// call for the same token. Calls for different tokens must not block each
/// other. A remote backend may suspend on its round trip, but the admit
/// decision itself has to happen store-side (a script or compare-and-set),
/// never as read-then-write from the caller.
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Return the bucket for `token`, creating an empty one if none exists.
    async fn get_or_create(
        &self,
        token: &str,
        limit: u64,
        window_ms: u64,
        now: i64,
    ) -> Result<Bucket>;

    /// Atomically fetch or create, roll over, and admit-or-reject.
    ///
    /// Returns whether the request was admitted and a snapshot of the
    /// bucket after the decision.
    async fn try_consume(
        &self,
        token: &str,
        limit: u64,
        window_ms: u64,
        now: i64,
    ) -> Result<(bool, Bucket)>;

    /// Forget buckets whose window ended more than `idle_grace_ms` ago.
    ///
    /// Returns the number of buckets removed.
    async fn sweep_expired(&self, now: i64, idle_grace_ms: u64) -> Result<usize>;

    /// Snapshot of the bucket for `token`, without creating or mutating it.
    async fn peek(&self, token: &str) -> Result<Option<Bucket>>;

    /// Number of live buckets.
    async fn len(&self) -> Result<usize>;
}

/// Process-local bucket store on a sharded concurrent map.
///
/// Each token hashes to one shard, and every mutation happens under that
/// shard's write lock with no `.await` in between, so a cancelled caller
/// can never leave a bucket half-updated.
#[derive(Debug, Default)]
pub struct InMemoryBucketStore {
    buckets: DashMap<String, Bucket>,
}

impl InMemoryBucketStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with room for `capacity` buckets before reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buckets: DashMap::with_capacity(capacity),
        }
    }

    /// Clear all buckets.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.buckets.clear();
    }
}

#[async_trait]
impl BucketStore for InMemoryBucketStore {
    async fn get_or_create(
        &self,
        token: &str,
        limit: u64,
        window_ms: u64,
        now: i64,
    ) -> Result<Bucket> {
        if let Some(bucket) = self.buckets.get(token) {
            return Ok(bucket.value().clone());
        }

        let bucket = self
            .buckets
            .entry(token.to_string())
            .or_insert_with(|| {
                debug!(token = %token, limit = limit, window_ms = window_ms, "Creating bucket");
                Bucket::new(token, limit, window::compute_reset(now, window_ms))
            });
        Ok(bucket.value().clone())
    }

    async fn try_consume(
        &self,
        token: &str,
        limit: u64,
        window_ms: u64,
        now: i64,
    ) -> Result<(bool, Bucket)> {
        // Hot path: existing bucket, no key allocation.
        if let Some(mut bucket) = self.buckets.get_mut(token) {
            let admitted = admit(&mut bucket, limit, window_ms, now);
            return Ok((admitted, bucket.value().clone()));
        }

        let mut bucket = self
            .buckets
            .entry(token.to_string())
            .or_insert_with(|| {
                debug!(token = %token, limit = limit, window_ms = window_ms, "Creating bucket");
                Bucket::new(token, limit, window::compute_reset(now, window_ms))
            });
        let admitted = admit(&mut bucket, limit, window_ms, now);
        Ok((admitted, bucket.value().clone()))
    }

    async fn sweep_expired(&self, now: i64, idle_grace_ms: u64) -> Result<usize> {
        let mut removed = 0;
        self.buckets.retain(|_, bucket| {
            if window::is_idle(bucket.reset_at(), idle_grace_ms, now) {
                removed += 1;
                false
            } else {
                true
            }
        });
        Ok(removed)
    }

    async fn peek(&self, token: &str) -> Result<Option<Bucket>> {
        Ok(self.buckets.get(token).map(|b| b.value().clone()))
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.buckets.len())
    }
}

fn admit(bucket: &mut Bucket, limit: u64, window_ms: u64, now: i64) -> bool {
    let previous_reset = bucket.reset_at();
    let admitted = bucket.try_admit(limit, window_ms, now);

    if bucket.reset_at() != previous_reset {
        debug!(
            token = %bucket.token(),
            reset_at = bucket.reset_at(),
            "Rolled bucket over to a new window"
        );
    }
    trace!(token = %bucket.token(), count = bucket.count(), admitted = admitted, "Consumed");

    admitted
}
