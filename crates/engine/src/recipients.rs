//! Recipient resolver — enrolled students not yet notified for a scope.
//!
//! Implemented as a single set-oriented anti-join (enrolled minus flagged)
//! so one query per subject replaces per-user existence checks. Results are
//! ordered by ascending user id for deterministic, resumable pagination
//! across runs.

use sqlx::PgPool;

use herald_common::error::AppError;
use herald_common::types::{NotificationScope, Recipient};

/// Resolves which enrolled students still need a notification for a scope.
pub struct RecipientResolver {
    pool: PgPool,
}

impl RecipientResolver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Return up to `limit + 1` students enrolled in `course_id` who hold no
    /// flag for `scope`, ordered by ascending user id.
    ///
    /// The overshoot of one lets the caller detect "more exist beyond this
    /// batch" without a separate count query.
    pub async fn next_recipients(
        &self,
        scope: &NotificationScope,
        course_id: i64,
        limit: u32,
    ) -> Result<Vec<Recipient>, AppError> {
        let recipients: Vec<Recipient> = sqlx::query_as(
            r#"
            SELECT s.id AS user_id, s.email, s.display_name, s.first_name, s.last_name
            FROM students s
            INNER JOIN enrollments e ON e.student_id = s.id AND e.course_id = $1
            LEFT JOIN notification_flags f ON f.user_id = s.id AND f.scope_key = $2
            WHERE f.user_id IS NULL
            ORDER BY s.id
            LIMIT $3
            "#,
        )
        .bind(course_id)
        .bind(scope.storage_key())
        .bind(i64::from(limit) + 1)
        .fetch_all(&self.pool)
        .await?;

        Ok(recipients)
    }
}
