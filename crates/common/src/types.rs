use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of entity whose start date can trigger a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum SubjectKind {
    Course,
    Unit,
}

impl std::fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubjectKind::Course => write!(f, "course"),
            SubjectKind::Unit => write!(f, "unit"),
        }
    }
}

/// A course or unit whose resolved start date falls on the run's "today".
///
/// Derived fresh from the LMS tables on every run; identity is `(kind, id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub id: i64,
    pub kind: SubjectKind,
    pub title: String,
    pub start_date: NaiveDate,
    /// Set for units only; the course whose enrollment list is notified.
    pub parent_course_id: Option<i64>,
}

impl Subject {
    /// The notification scope this subject's flags are written under.
    pub fn scope(&self) -> NotificationScope {
        match self.kind {
            SubjectKind::Course => NotificationScope::Course(self.id),
            SubjectKind::Unit => NotificationScope::Unit(self.id),
        }
    }

    /// The course whose enrollments determine this subject's recipients.
    pub fn enrollment_course_id(&self) -> i64 {
        self.parent_course_id.unwrap_or(self.id)
    }
}

/// An enrolled student eligible to receive a notification.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Recipient {
    pub user_id: i64,
    pub email: String,
    pub display_name: String,
    pub first_name: String,
    pub last_name: String,
}

/// Identifies one notifiable context for idempotency-flag purposes.
///
/// Replaces ad-hoc prefixed strings with a tagged variant whose storage-key
/// serialization is a pure, total function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NotificationScope {
    Course(i64),
    Unit(i64),
    Custom(String),
}

impl NotificationScope {
    /// Serialize the scope to its storage key.
    pub fn storage_key(&self) -> String {
        match self {
            NotificationScope::Course(id) => format!("course:{id}"),
            NotificationScope::Unit(id) => format!("unit:{id}"),
            NotificationScope::Custom(token) => format!("custom:{token}"),
        }
    }
}

impl std::fmt::Display for NotificationScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.storage_key())
    }
}

/// A persisted "already notified" marker for one user and scope.
///
/// Written only after a successful send; its existence means "do not resend
/// for this scope". Removed by the garbage collector once `sent_at` falls
/// outside the retention window.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationFlag {
    pub user_id: i64,
    pub scope_key: String,
    pub sent_at: DateTime<Utc>,
}

/// Per-invocation run state, created at run start and consumed at run end.
///
/// Threaded through each pipeline step by value or `&mut`; never persisted
/// and never shared between invocations.
#[derive(Debug, Clone)]
pub struct BatchRun {
    /// Correlation id for this invocation's log output.
    pub run_id: Uuid,
    /// Resolved once at run start; every eligibility comparison in the
    /// invocation uses this value, even if the run straddles midnight.
    pub today: NaiveDate,
    /// Notifications successfully sent so far. Never exceeds `max_emails`.
    pub processed: u32,
    /// Max. number of notifications sent during this invocation.
    pub max_emails: u32,
    /// Wait before the follow-up run when the batch was truncated.
    pub batch_delay: Duration,
    /// True when eligible recipients remain beyond this batch.
    pub has_more: bool,
}

impl BatchRun {
    pub fn new(today: NaiveDate, max_emails: u32, batch_delay: Duration) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            today,
            processed: 0,
            max_emails,
            batch_delay,
            has_more: false,
        }
    }

    /// True once the per-invocation send cap is exhausted.
    pub fn cap_reached(&self) -> bool {
        self.processed >= self.max_emails
    }

    /// Record one successful send.
    pub fn note_sent(&mut self) {
        debug_assert!(self.processed < self.max_emails);
        self.processed += 1;
    }
}

/// Which notification template a send uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MailKind {
    CourseStart,
    UnitStart,
}

impl std::fmt::Display for MailKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MailKind::CourseStart => write!(f, "course_start"),
            MailKind::UnitStart => write!(f, "unit_start"),
        }
    }
}

/// Template variables for one outgoing notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailVariables {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
    pub subject_id: i64,
    pub subject_title: String,
}

impl MailVariables {
    /// Build variables from a recipient profile and subject context.
    ///
    /// `first_name` falls back to the display name when both first and last
    /// name are empty, so templates never greet with a blank.
    pub fn build(recipient: &Recipient, subject: &Subject) -> Self {
        let first_name = if recipient.first_name.is_empty() && recipient.last_name.is_empty() {
            recipient.display_name.clone()
        } else {
            recipient.first_name.clone()
        };

        Self {
            email: recipient.email.clone(),
            first_name,
            last_name: recipient.last_name.clone(),
            display_name: recipient.display_name.clone(),
            subject_id: subject.id,
            subject_title: subject.title.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_recipient(first: &str, last: &str) -> Recipient {
        Recipient {
            user_id: 7,
            email: "student@example.com".to_string(),
            display_name: "studly".to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
        }
    }

    fn make_subject() -> Subject {
        Subject {
            id: 12,
            kind: SubjectKind::Course,
            title: "Rust 101".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            parent_course_id: None,
        }
    }

    #[test]
    fn test_storage_key_course() {
        assert_eq!(NotificationScope::Course(42).storage_key(), "course:42");
    }

    #[test]
    fn test_storage_key_unit() {
        assert_eq!(NotificationScope::Unit(9).storage_key(), "unit:9");
    }

    #[test]
    fn test_storage_key_custom() {
        assert_eq!(
            NotificationScope::Custom("welcome".to_string()).storage_key(),
            "custom:welcome"
        );
    }

    #[test]
    fn test_subject_scope_follows_kind() {
        let course = make_subject();
        assert_eq!(course.scope(), NotificationScope::Course(12));

        let unit = Subject {
            id: 3,
            kind: SubjectKind::Unit,
            parent_course_id: Some(12),
            ..make_subject()
        };
        assert_eq!(unit.scope(), NotificationScope::Unit(3));
        assert_eq!(unit.enrollment_course_id(), 12);
    }

    #[test]
    fn test_first_name_fallback_when_both_empty() {
        let vars = MailVariables::build(&make_recipient("", ""), &make_subject());
        assert_eq!(vars.first_name, "studly");
    }

    #[test]
    fn test_first_name_kept_when_last_name_present() {
        // Only an empty first AND last name triggers the fallback.
        let vars = MailVariables::build(&make_recipient("", "Doe"), &make_subject());
        assert_eq!(vars.first_name, "");
        assert_eq!(vars.last_name, "Doe");
    }

    #[test]
    fn test_first_name_used_when_present() {
        let vars = MailVariables::build(&make_recipient("Jane", "Doe"), &make_subject());
        assert_eq!(vars.first_name, "Jane");
    }

    #[test]
    fn test_batch_run_cap() {
        let today = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
        let mut run = BatchRun::new(today, 2, Duration::from_secs(30));

        assert!(!run.cap_reached());
        run.note_sent();
        assert!(!run.cap_reached());
        run.note_sent();
        assert!(run.cap_reached());
        assert_eq!(run.processed, 2);
    }
}
