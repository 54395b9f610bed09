//! Dispatch engine — sends notifications for a run's eligible subjects.
//!
//! Iterates subjects in scan order (all courses, then all units) and each
//! subject's recipients in ascending user-id order. A global per-invocation
//! cap bounds the number of sends; reaching it with recipients remaining sets
//! `has_more` and aborts all further iteration so the rescheduler can queue a
//! fast follow-up run.

use chrono::Utc;
use sqlx::PgPool;

use herald_common::error::AppError;
use herald_common::types::{
    BatchRun, MailKind, MailVariables, NotificationScope, Recipient, Subject, SubjectKind,
};
use herald_mailer::Mailer;

use crate::flags::FlagStore;
use crate::recipients::RecipientResolver;

/// Sends capped batches of notifications and records idempotency flags.
pub struct Dispatcher<M> {
    resolver: RecipientResolver,
    flags: FlagStore,
    mailer: M,
}

impl<M: Mailer> Dispatcher<M> {
    pub fn new(pool: PgPool, mailer: M) -> Self {
        Self {
            resolver: RecipientResolver::new(pool.clone()),
            flags: FlagStore::new(pool),
            mailer,
        }
    }

    /// Process every subject until the batch cap cuts the run short.
    ///
    /// A store failure aborts only the current subject; the run logs it and
    /// continues with the next subject so one broken subject cannot block its
    /// siblings.
    pub async fn dispatch(&self, subjects: &[Subject], run: &mut BatchRun) {
        for subject in subjects {
            if run.has_more {
                break;
            }

            if let Err(e) = self.process_subject(subject, run).await {
                tracing::error!(
                    run_id = %run.run_id,
                    subject_id = subject.id,
                    kind = %subject.kind,
                    error = %e,
                    "Subject processing failed, continuing with next subject"
                );
            }
        }
    }

    async fn process_subject(
        &self,
        subject: &Subject,
        run: &mut BatchRun,
    ) -> Result<(), AppError> {
        let scope = subject.scope();
        let recipients = self
            .resolver
            .next_recipients(&scope, subject.enrollment_course_id(), run.max_emails)
            .await?;

        for recipient in &recipients {
            if run.cap_reached() {
                run.has_more = true;
                tracing::info!(
                    run_id = %run.run_id,
                    scope = %scope,
                    processed = run.processed,
                    "Send cap reached with recipients remaining, deferring rest of batch"
                );
                return Ok(());
            }

            self.send_one(subject, &scope, recipient, run).await?;
        }

        Ok(())
    }

    async fn send_one(
        &self,
        subject: &Subject,
        scope: &NotificationScope,
        recipient: &Recipient,
        run: &mut BatchRun,
    ) -> Result<(), AppError> {
        let kind = mail_kind(subject.kind);
        let vars = MailVariables::build(recipient, subject);

        if self.mailer.send(kind, &vars).await {
            // Flag only on success, so a failed send stays eligible for the
            // next run. The flag write and the counter move together.
            run.note_sent();
            self.flags.put(recipient.user_id, scope, Utc::now()).await?;

            tracing::debug!(
                run_id = %run.run_id,
                user_id = recipient.user_id,
                scope = %scope,
                "Notification sent and flagged"
            );
        } else {
            // A failed send does not consume the cap either; counting it
            // would let failures starve recipients later in the batch.
            tracing::warn!(
                run_id = %run.run_id,
                user_id = recipient.user_id,
                scope = %scope,
                "Notification send failed, recipient stays eligible for next run"
            );
        }

        Ok(())
    }
}

/// Template kind for a subject's notifications.
fn mail_kind(kind: SubjectKind) -> MailKind {
    match kind {
        SubjectKind::Course => MailKind::CourseStart,
        SubjectKind::Unit => MailKind::UnitStart,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mail_kind_follows_subject_kind() {
        assert_eq!(mail_kind(SubjectKind::Course), MailKind::CourseStart);
        assert_eq!(mail_kind(SubjectKind::Unit), MailKind::UnitStart);
    }
}
