//! Always-on scheduled-task runner.
//!
//! Owns the batch task's lifecycle independently of any other application
//! traffic: the daemon self-heals its registration, waits for the next due
//! occurrence, and executes one batch invocation at a time under the Redis
//! run lock. A truncated batch reschedules itself for a fast follow-up via
//! the registry, which this loop picks up on its next poll.

use std::time::Duration;

use chrono::Utc;
use redis::aio::ConnectionManager;
use sqlx::PgPool;

use herald_engine::lock::RunLock;
use herald_engine::runner::BatchRunner;
use herald_engine::schedule::{ScheduleRegistry, TASK_SCHEDULED_MAILS};
use herald_mailer::Mailer;

/// How long the daemon sleeps between schedule polls when nothing is due.
/// Must stay below the batch delay so follow-up runs fire promptly.
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Periodic driver for the notification batch task.
pub struct ScheduleDaemon<M> {
    registry: ScheduleRegistry,
    lock: RunLock,
    runner: BatchRunner<M>,
}

impl<M: Mailer> ScheduleDaemon<M> {
    pub fn new(
        pool: PgPool,
        redis: ConnectionManager,
        runner: BatchRunner<M>,
        interval: Duration,
    ) -> Self {
        Self {
            registry: ScheduleRegistry::new(pool, TASK_SCHEDULED_MAILS, interval),
            lock: RunLock::new(redis, TASK_SCHEDULED_MAILS),
            runner,
        }
    }

    /// Run the scheduling loop. Runs indefinitely until the task is cancelled.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        tracing::info!(
            task = TASK_SCHEDULED_MAILS,
            poll_interval_secs = POLL_INTERVAL.as_secs(),
            "Schedule daemon started"
        );

        loop {
            if let Err(e) = self.tick().await {
                tracing::error!(error = %e, "Scheduler tick failed, retrying after poll interval");
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
    }

    async fn tick(&mut self) -> anyhow::Result<()> {
        // Self-heal: re-register if the occurrence went missing.
        self.registry.ensure_scheduled().await?;

        let Some(next) = self.registry.next_occurrence().await? else {
            // ensure_scheduled just registered one; re-read next tick.
            return Ok(());
        };

        let now = Utc::now();
        if next > now {
            let until_due = (next - now).to_std().unwrap_or(POLL_INTERVAL);
            tokio::time::sleep(until_due.min(POLL_INTERVAL)).await;
            return Ok(());
        }

        // Advance to the next regular tick before running, so a crashed run
        // cannot leave a stale past-due occurrence behind. A truncated batch
        // overrides this with its own fast follow-up during finalize.
        self.registry.advance(now).await?;

        if !self.lock.acquire().await? {
            return Ok(());
        }

        let result = self.runner.run_once().await;

        if let Err(e) = self.lock.release().await {
            tracing::warn!(error = %e, "Failed to release run lock, lease will expire via TTL");
        }

        if let Err(e) = result {
            tracing::error!(error = %e, "Notification batch failed");
        }

        Ok(())
    }
}
