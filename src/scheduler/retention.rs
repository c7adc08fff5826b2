use crate::constants::TaskStatus;
use crate::error::Result;
use crate::logging::{log_error, log_scheduler_unit};
use crate::models::Task;
use crate::state_machine::{TaskEvent, TaskStateMachine};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

const JOB: &str = "retention";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionReport {
    pub cutoff: DateTime<Utc>,
    pub candidates: usize,
    pub archived: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Archives completed tasks whose last update is older than the window.
///
/// Candidates are read in pages of `batch_size` until none remain. Each task
/// is archived in its own transaction through the state machine, so one bad
/// row never blocks the rest and re-running is harmless.
#[derive(Clone)]
pub struct RetentionJob {
    pool: PgPool,
    retention_days: u32,
    batch_size: i64,
}

crate::debug_with_pgpool!(RetentionJob {
    pool: PgPool,
    retention_days,
    batch_size
});

impl RetentionJob {
    pub fn new(pool: PgPool, retention_days: u32, batch_size: i64) -> Self {
        Self {
            pool,
            retention_days,
            batch_size: batch_size.max(1),
        }
    }

    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(i64::from(self.retention_days))
    }

    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<RetentionReport> {
        let cutoff = self.cutoff(now);
        let mut report = RetentionReport {
            cutoff,
            candidates: 0,
            archived: 0,
            skipped: 0,
            failed: 0,
        };

        // Page until the backlog is drained; the keyset cursor moves past
        // rows that failed so they cannot starve the rest.
        let mut after = None;
        loop {
            let page =
                Task::list_completed_before(&self.pool, cutoff, after, self.batch_size).await?;
            report.candidates += page.len();

            for &(_, task_id) in &page {
                match self.archive_one(task_id, cutoff, now).await {
                    Ok(true) => {
                        report.archived += 1;
                        log_scheduler_unit(JOB, &task_id.to_string(), None, "archived");
                    }
                    Ok(false) => report.skipped += 1,
                    Err(err) => {
                        report.failed += 1;
                        log_error(JOB, "archive", &err.to_string(), Some(&format!("task={task_id}")));
                    }
                }
            }

            if (page.len() as i64) < self.batch_size {
                break;
            }
            after = page.last().copied();
        }

        info!(
            cutoff = %cutoff,
            candidates = report.candidates,
            archived = report.archived,
            skipped = report.skipped,
            failed = report.failed,
            "Retention run finished"
        );
        Ok(report)
    }

    /// Archive one task if it still qualifies once locked.
    async fn archive_one(&self, task_id: Uuid, cutoff: DateTime<Utc>, now: DateTime<Utc>) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let Some(mut task) = Task::lock_for_update(&mut tx, task_id).await? else {
            return Ok(false);
        };
        if task.status != TaskStatus::Completed || task.updated_at >= cutoff {
            return Ok(false);
        }

        TaskStateMachine::apply(&mut tx, &mut task, &TaskEvent::Archive, None, now).await?;
        tx.commit().await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn test_cutoff_is_window_before_now() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgresql://localhost/unused")
            .unwrap();
        let job = RetentionJob::new(pool, 30, 100);
        let now = Utc.with_ymd_and_hms(2025, 3, 31, 12, 0, 0).unwrap();
        assert_eq!(job.cutoff(now), Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap());
    }
}
