//! Batch runner — one scheduled invocation end to end.
//!
//! Per invocation: build fresh run state, scan for subjects starting today
//! (courses first, then units), dispatch up to the cap, then finalize —
//! either queue a fast follow-up run for the backlog or, on a fully idle
//! run, garbage-collect expired flags.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use sqlx::PgPool;

use herald_common::config::AppConfig;
use herald_common::types::{BatchRun, SubjectKind};
use herald_mailer::Mailer;

use crate::dispatcher::Dispatcher;
use crate::flags::FlagStore;
use crate::scanner::EligibilityScanner;
use crate::schedule::{ScheduleRegistry, TASK_SCHEDULED_MAILS};

/// Tunables for one batch invocation.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub max_emails: u32,
    pub batch_delay: Duration,
    pub schedule_interval: Duration,
    pub flag_retention: chrono::Duration,
    pub timezone_offset_minutes: i32,
}

impl RunnerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_emails: config.max_emails,
            batch_delay: Duration::from_secs(config.batch_delay_secs),
            schedule_interval: Duration::from_secs(config.schedule_interval_secs),
            flag_retention: chrono::Duration::days(config.flag_retention_days),
            timezone_offset_minutes: config.timezone_offset_minutes,
        }
    }
}

/// What the rescheduler does once a run's dispatch work is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeAction {
    /// Backlog remains; fire again after the batch delay.
    Reschedule,
    /// Fully idle run; safe window for flag garbage collection.
    CollectGarbage,
    /// Active run without backlog; GC is skipped to bound per-run cost.
    Nothing,
}

impl FinalizeAction {
    pub fn decide(run: &BatchRun) -> Self {
        if run.has_more {
            FinalizeAction::Reschedule
        } else if run.processed == 0 {
            FinalizeAction::CollectGarbage
        } else {
            FinalizeAction::Nothing
        }
    }
}

/// Executes one scheduled notification batch per call.
pub struct BatchRunner<M> {
    scanner: EligibilityScanner,
    dispatcher: Dispatcher<M>,
    flags: FlagStore,
    registry: ScheduleRegistry,
    settings: RunnerSettings,
}

impl<M: Mailer> BatchRunner<M> {
    pub fn new(pool: PgPool, mailer: M, settings: RunnerSettings) -> Self {
        Self {
            scanner: EligibilityScanner::new(pool.clone()),
            dispatcher: Dispatcher::new(pool.clone(), mailer),
            flags: FlagStore::new(pool.clone()),
            registry: ScheduleRegistry::new(pool, TASK_SCHEDULED_MAILS, settings.schedule_interval),
            settings,
        }
    }

    /// Run one batch invocation and return its final state.
    pub async fn run_once(&self) -> anyhow::Result<BatchRun> {
        let today = resolve_today(Utc::now(), self.settings.timezone_offset_minutes);
        let mut run = BatchRun::new(today, self.settings.max_emails, self.settings.batch_delay);

        tracing::info!(
            run_id = %run.run_id,
            today = %run.today,
            max_emails = run.max_emails,
            "Notification batch started"
        );

        // Scan order matters: course notifications first, then units.
        let mut subjects = self
            .scanner
            .subjects_starting_today(SubjectKind::Course, run.today)
            .await?;
        subjects.extend(
            self.scanner
                .subjects_starting_today(SubjectKind::Unit, run.today)
                .await?,
        );

        if !subjects.is_empty() {
            tracing::info!(
                run_id = %run.run_id,
                subjects = subjects.len(),
                "Found subjects starting today"
            );
        }

        self.dispatcher.dispatch(&subjects, &mut run).await;
        self.finalize(&run).await?;

        tracing::info!(
            run_id = %run.run_id,
            processed = run.processed,
            has_more = run.has_more,
            "Notification batch finished"
        );

        Ok(run)
    }

    async fn finalize(&self, run: &BatchRun) -> anyhow::Result<()> {
        match FinalizeAction::decide(run) {
            FinalizeAction::Reschedule => {
                // Convert the backlog into a fast-draining trickle instead of
                // waiting for the next regular tick.
                let delay = chrono::Duration::from_std(run.batch_delay)?;
                self.registry.clear().await?;
                self.registry.register(Utc::now() + delay).await?;

                tracing::info!(
                    run_id = %run.run_id,
                    delay_secs = run.batch_delay.as_secs(),
                    "Backlog remains, follow-up run scheduled"
                );
            }
            FinalizeAction::CollectGarbage => {
                let cutoff = Utc::now() - self.settings.flag_retention;
                let removed = self.flags.delete_older_than(cutoff).await?;

                if removed > 0 {
                    tracing::info!(run_id = %run.run_id, removed, "Expired notification flags removed");
                }
            }
            FinalizeAction::Nothing => {}
        }

        Ok(())
    }
}

/// Resolve "today" for the configured UTC offset.
///
/// Computed once per invocation; the whole run compares against this value
/// even when it straddles midnight.
fn resolve_today(now: DateTime<Utc>, offset_minutes: i32) -> NaiveDate {
    match FixedOffset::east_opt(offset_minutes * 60) {
        Some(offset) => now.with_timezone(&offset).date_naive(),
        None => now.date_naive(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_run(processed: u32, has_more: bool) -> BatchRun {
        let today = NaiveDate::from_ymd_opt(2026, 8, 27).unwrap();
        let mut run = BatchRun::new(today, 50, Duration::from_secs(30));
        run.processed = processed;
        run.has_more = has_more;
        run
    }

    #[test]
    fn test_finalize_reschedules_on_backlog() {
        assert_eq!(
            FinalizeAction::decide(&make_run(50, true)),
            FinalizeAction::Reschedule
        );
    }

    #[test]
    fn test_finalize_collects_garbage_on_idle_run() {
        assert_eq!(
            FinalizeAction::decide(&make_run(0, false)),
            FinalizeAction::CollectGarbage
        );
    }

    #[test]
    fn test_finalize_skips_gc_on_active_run() {
        // Active but complete: no reschedule, and no GC either.
        assert_eq!(
            FinalizeAction::decide(&make_run(3, false)),
            FinalizeAction::Nothing
        );
    }

    #[test]
    fn test_resolve_today_utc() {
        let now = Utc.with_ymd_and_hms(2026, 8, 27, 23, 30, 0).unwrap();
        assert_eq!(
            resolve_today(now, 0),
            NaiveDate::from_ymd_opt(2026, 8, 27).unwrap()
        );
    }

    #[test]
    fn test_resolve_today_positive_offset_crosses_midnight() {
        let now = Utc.with_ymd_and_hms(2026, 8, 27, 23, 30, 0).unwrap();
        // UTC+2: local time is already past midnight.
        assert_eq!(
            resolve_today(now, 120),
            NaiveDate::from_ymd_opt(2026, 8, 28).unwrap()
        );
    }

    #[test]
    fn test_resolve_today_negative_offset() {
        let now = Utc.with_ymd_and_hms(2026, 8, 27, 0, 30, 0).unwrap();
        // UTC-5: local date is still the previous day.
        assert_eq!(
            resolve_today(now, -300),
            NaiveDate::from_ymd_opt(2026, 8, 26).unwrap()
        );
    }
}
