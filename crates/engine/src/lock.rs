//! Run lock — Redis-backed mutual exclusion for batch invocations.
//!
//! The schedule guarantees at most one pending occurrence, but an overrunning
//! invocation could still overlap the next tick. Two concurrent runs would
//! each count sends against their own cap and defeat the rate limit, so every
//! invocation must hold this lease for its duration.
//!
//! Uses Redis `SET NX EX` for atomic acquire with automatic TTL expiry.

use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// Lease TTL in seconds; bounds how long a crashed run can hold the lock.
const LOCK_TTL_SECONDS: u64 = 600;

/// Redis-backed run lock keyed by task identity.
pub struct RunLock {
    redis: ConnectionManager,
    key: String,
}

impl RunLock {
    pub fn new(redis: ConnectionManager, task: &str) -> Self {
        Self {
            redis,
            key: format!("herald:run_lock:{task}"),
        }
    }

    /// Try to acquire the lease.
    ///
    /// Returns `true` if this invocation now holds the lock; `false` means
    /// another invocation is still running and this one must be skipped.
    pub async fn acquire(&mut self) -> anyhow::Result<bool> {
        // SET key "1" NX EX ttl
        // Some("OK") if the key was set (lock acquired), None if it exists.
        let result: Option<String> = redis::cmd("SET")
            .arg(&self.key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(LOCK_TTL_SECONDS)
            .query_async(&mut self.redis)
            .await?;

        let acquired = result.is_some();

        if !acquired {
            tracing::warn!(
                key = %self.key,
                "Run lock held by another invocation, skipping this tick"
            );
        }

        Ok(acquired)
    }

    /// Release the lease at the end of a run.
    pub async fn release(&mut self) -> anyhow::Result<()> {
        self.redis.del::<_, ()>(&self.key).await?;
        Ok(())
    }
}
