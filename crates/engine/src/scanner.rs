//! Eligibility scanner — finds courses and units whose start date is "today".
//!
//! Loads every published entity of the requested kind and resolves its start
//! date through the cascade: a unit-specific override wins, otherwise the
//! parent course's start date applies. The scan is unbounded — O(published
//! entities) per run — which is acceptable at single-installation LMS scale.

use chrono::NaiveDate;
use sqlx::PgPool;

use herald_common::error::AppError;
use herald_common::types::{Subject, SubjectKind};

/// Row shape for the published-courses scan.
#[derive(Debug, sqlx::FromRow)]
struct CourseRow {
    id: i64,
    title: String,
    start_date: Option<NaiveDate>,
}

/// Row shape for the published-units scan, joined with the parent course.
#[derive(Debug, sqlx::FromRow)]
struct UnitRow {
    id: i64,
    course_id: i64,
    title: String,
    start_date: Option<NaiveDate>,
    course_start_date: Option<NaiveDate>,
}

/// Scans the LMS tables for subjects starting on the run's "today".
pub struct EligibilityScanner {
    pool: PgPool,
}

impl EligibilityScanner {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Return all subjects of the given kind whose resolved start date equals
    /// `today`, in ascending id order.
    pub async fn subjects_starting_today(
        &self,
        kind: SubjectKind,
        today: NaiveDate,
    ) -> Result<Vec<Subject>, AppError> {
        match kind {
            SubjectKind::Course => self.courses_starting_today(today).await,
            SubjectKind::Unit => self.units_starting_today(today).await,
        }
    }

    async fn courses_starting_today(&self, today: NaiveDate) -> Result<Vec<Subject>, AppError> {
        let rows: Vec<CourseRow> = sqlx::query_as(
            "SELECT id, title, start_date FROM courses WHERE published = true ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let subjects = rows
            .into_iter()
            .filter_map(|row| {
                let start_date = row.start_date?;
                (start_date == today).then(|| Subject {
                    id: row.id,
                    kind: SubjectKind::Course,
                    title: row.title,
                    start_date,
                    parent_course_id: None,
                })
            })
            .collect();

        Ok(subjects)
    }

    async fn units_starting_today(&self, today: NaiveDate) -> Result<Vec<Subject>, AppError> {
        let rows: Vec<UnitRow> = sqlx::query_as(
            r#"
            SELECT u.id, u.course_id, u.title, u.start_date,
                   c.start_date AS course_start_date
            FROM units u
            JOIN courses c ON c.id = u.course_id
            WHERE u.published = true
            ORDER BY u.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let subjects = rows
            .into_iter()
            .filter_map(|row| {
                let start_date =
                    resolve_unit_start(row.start_date, row.course_start_date, today)?;
                Some(Subject {
                    id: row.id,
                    kind: SubjectKind::Unit,
                    title: row.title,
                    start_date,
                    parent_course_id: Some(row.course_id),
                })
            })
            .collect();

        Ok(subjects)
    }
}

/// Resolve a unit's effective start date and decide whether it notifies today.
///
/// A unit without its own start date inherits the parent course's. A unit
/// whose resolved start date coincides with the course's start date is
/// excluded: its students are already covered by the course-level
/// notification.
fn resolve_unit_start(
    unit_start: Option<NaiveDate>,
    course_start: Option<NaiveDate>,
    today: NaiveDate,
) -> Option<NaiveDate> {
    let resolved = unit_start.or(course_start)?;

    if Some(resolved) == course_start {
        return None;
    }

    (resolved == today).then_some(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_unit_with_own_date_matching_today() {
        let today = date(2026, 8, 27);
        let resolved = resolve_unit_start(Some(today), Some(date(2026, 8, 1)), today);
        assert_eq!(resolved, Some(today));
    }

    #[test]
    fn test_unit_same_date_as_course_excluded() {
        let today = date(2026, 8, 27);
        // Course starts today too — the course-level notification covers it.
        assert_eq!(resolve_unit_start(Some(today), Some(today), today), None);
    }

    #[test]
    fn test_unit_inheriting_course_date_excluded() {
        let today = date(2026, 8, 27);
        // No unit override means the resolved date IS the course date.
        assert_eq!(resolve_unit_start(None, Some(today), today), None);
    }

    #[test]
    fn test_unit_not_starting_today() {
        let today = date(2026, 8, 27);
        let resolved = resolve_unit_start(Some(date(2026, 8, 28)), Some(date(2026, 8, 1)), today);
        assert_eq!(resolved, None);
    }

    #[test]
    fn test_unit_without_any_date() {
        let today = date(2026, 8, 27);
        assert_eq!(resolve_unit_start(None, None, today), None);
    }
}
