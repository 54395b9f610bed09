//! Schedule registry — the persistent record of the recurring batch task.
//!
//! One row per task holds the next occurrence and the recurrence interval.
//! Registration is clear-then-register and therefore idempotent: a duplicate
//! attempt is not an error, it simply rewrites the same row.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use herald_common::error::AppError;

/// Task identity of the recurring notification batch.
pub const TASK_SCHEDULED_MAILS: &str = "herald_scheduled_mails";

/// DB-backed registry of scheduled task occurrences.
pub struct ScheduleRegistry {
    pool: PgPool,
    task: String,
    interval: Duration,
}

impl ScheduleRegistry {
    pub fn new(pool: PgPool, task: &str, interval: Duration) -> Self {
        Self {
            pool,
            task: task.to_string(),
            interval,
        }
    }

    /// When the task is next due, if a registration exists.
    pub async fn next_occurrence(&self) -> Result<Option<DateTime<Utc>>, AppError> {
        let row: Option<(DateTime<Utc>,)> =
            sqlx::query_as("SELECT next_run_at FROM schedule_state WHERE task = $1")
                .bind(&self.task)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(next_run_at,)| next_run_at))
    }

    /// Remove any registration for the task.
    pub async fn clear(&self) -> Result<(), AppError> {
        sqlx::query("DELETE FROM schedule_state WHERE task = $1")
            .bind(&self.task)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Register (or rewrite) the task to first fire at `first_run_at`,
    /// recurring at the registry's interval.
    pub async fn register(&self, first_run_at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO schedule_state (task, next_run_at, interval_seconds)
            VALUES ($1, $2, $3)
            ON CONFLICT (task) DO UPDATE
                SET next_run_at = $2, interval_seconds = $3, updated_at = NOW()
            "#,
        )
        .bind(&self.task)
        .bind(first_run_at)
        .bind(self.interval.as_secs() as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Move the next occurrence one interval into the future. Called when a
    /// due tick fires, before the batch itself runs.
    pub async fn advance(&self, now: DateTime<Utc>) -> Result<(), AppError> {
        let next = now
            + chrono::Duration::from_std(self.interval)
                .map_err(|e| AppError::Schedule(e.to_string()))?;
        self.register(next).await
    }

    /// Idempotently guarantee a pending occurrence exists.
    ///
    /// If none is registered, any stale row is cleared and the task is
    /// re-registered to fire immediately.
    pub async fn ensure_scheduled(&self) -> Result<(), AppError> {
        if self.next_occurrence().await?.is_none() {
            self.clear().await?;
            self.register(Utc::now()).await?;

            tracing::info!(
                task = %self.task,
                interval_secs = self.interval.as_secs(),
                "No pending occurrence found, schedule re-registered"
            );
        }

        Ok(())
    }
}
