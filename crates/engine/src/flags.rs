//! Flag store — persistent "already notified" markers and their cleanup.
//!
//! At most one flag exists per (user, scope); it is written only after a
//! successful send, so a failed send leaves the recipient eligible for the
//! next run.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use herald_common::error::AppError;
use herald_common::types::NotificationScope;

/// Persistent idempotency-marker store keyed by (user, scope).
pub struct FlagStore {
    pool: PgPool,
}

impl FlagStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Look up when a user was notified for a scope, if ever.
    pub async fn get(
        &self,
        user_id: i64,
        scope: &NotificationScope,
    ) -> Result<Option<DateTime<Utc>>, AppError> {
        let row: Option<(DateTime<Utc>,)> = sqlx::query_as(
            "SELECT sent_at FROM notification_flags WHERE user_id = $1 AND scope_key = $2",
        )
        .bind(user_id)
        .bind(scope.storage_key())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(sent_at,)| sent_at))
    }

    /// Record that a user was notified for a scope.
    pub async fn put(
        &self,
        user_id: i64,
        scope: &NotificationScope,
        sent_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO notification_flags (user_id, scope_key, sent_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, scope_key) DO UPDATE SET sent_at = $3
            "#,
        )
        .bind(user_id)
        .bind(scope.storage_key())
        .bind(sent_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete all flags older than `cutoff` in one bulk operation.
    ///
    /// Only invoked on idle runs; the flag population is naturally bounded by
    /// retention window x notification rate. Returns the number of flags
    /// removed.
    pub async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM notification_flags WHERE sent_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
