use crate::clock::Clock;
use crate::constants::ReportType;
use crate::error::Result;
use crate::logging::{log_error, log_scheduler_unit};
use crate::models::{Machine, Report, StockMovement};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const JOB: &str = "reporting";

/// Machines summarized concurrently; output keeps machine order.
const REPORT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportingRunReport {
    pub report_date: NaiveDate,
    /// False when a report for the date already existed
    pub created: bool,
    pub machines: usize,
    pub failed_machines: Vec<Uuid>,
}

/// Writes the daily stock summary for the previous UTC day.
#[derive(Clone)]
pub struct ReportingJob {
    pool: PgPool,
    clock: Arc<dyn Clock>,
    unit_timeout: std::time::Duration,
}

impl std::fmt::Debug for ReportingJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportingJob")
            .field("pool", &"PgPool")
            .field("unit_timeout", &self.unit_timeout)
            .finish()
    }
}

/// `[start, end)` of the UTC day before `now`.
pub fn previous_day_window(now: DateTime<Utc>) -> (NaiveDate, DateTime<Utc>, DateTime<Utc>) {
    let day = now.date_naive() - Duration::days(1);
    let start = day.and_time(chrono::NaiveTime::MIN).and_utc();
    (day, start, start + Duration::days(1))
}

impl ReportingJob {
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>, unit_timeout: std::time::Duration) -> Self {
        Self {
            pool,
            clock,
            unit_timeout,
        }
    }

    /// Summarize yesterday's machine movements unless already summarized.
    ///
    /// A machine whose totals cannot be read is listed under
    /// `failedMachines` in the payload; the rest of the report still lands.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<ReportingRunReport> {
        let (report_date, start, end) = previous_day_window(now);

        if Report::find(&self.pool, report_date, ReportType::DailyStockSummary)
            .await?
            .is_some()
        {
            info!(report_date = %report_date, "Daily stock summary already exists");
            return Ok(ReportingRunReport {
                report_date,
                created: false,
                machines: 0,
                failed_machines: Vec::new(),
            });
        }

        let machines = Machine::list_active(&self.pool).await?;
        let mut summaries = Vec::with_capacity(machines.len());
        let mut failed_machines = Vec::new();
        let (mut total_count, mut total_in, mut total_out) = (0i64, 0i64, 0i64);

        let totals: Vec<_> = stream::iter(machines.iter().cloned())
            .map(|machine| async move {
                let totals = tokio::time::timeout(
                    self.unit_timeout,
                    StockMovement::machine_totals(&self.pool, machine.id, start, end),
                )
                .await;
                (machine, totals)
            })
            .buffered(REPORT_CONCURRENCY)
            .collect()
            .await;

        for (machine, totals) in totals {
            let items = match totals {
                Ok(Ok(items)) => items,
                Ok(Err(err)) => {
                    log_error(JOB, "machine_totals", &err.to_string(), Some(&format!("machine={}", machine.code)));
                    failed_machines.push(machine.id);
                    continue;
                }
                Err(_) => {
                    log_error(JOB, "machine_totals", "timed out", Some(&format!("machine={}", machine.code)));
                    failed_machines.push(machine.id);
                    continue;
                }
            };

            let movement_count: i64 = items.iter().map(|i| i.movement_count).sum();
            let units_in: i64 = items.iter().map(|i| i.units_in).sum();
            let units_out: i64 = items.iter().map(|i| i.units_out).sum();
            total_count += movement_count;
            total_in += units_in;
            total_out += units_out;

            summaries.push(json!({
                "machineId": machine.id,
                "code": machine.code,
                "movementCount": movement_count,
                "unitsIn": units_in,
                "unitsOut": units_out,
                "items": items,
            }));
            log_scheduler_unit(JOB, &machine.code, None, "summarized");
        }

        let report = Report {
            id: Uuid::new_v4(),
            report_date,
            report_type: ReportType::DailyStockSummary,
            payload: json!({
                "date": report_date,
                "machines": summaries,
                "totals": {
                    "movementCount": total_count,
                    "unitsIn": total_in,
                    "unitsOut": total_out,
                },
                "failedMachines": failed_machines,
            }),
            created_at: self.clock.now(),
        };
        let created = Report::insert_if_absent(&self.pool, &report).await?;

        info!(
            report_date = %report_date,
            created = created,
            machines = machines.len(),
            failed = failed_machines.len(),
            "Daily stock summary run finished"
        );
        Ok(ReportingRunReport {
            report_date,
            created,
            machines: machines.len(),
            failed_machines,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_previous_day_window_is_half_open() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 0, 5, 0).unwrap();
        let (day, start, end) = previous_day_window(now);
        assert_eq!(day, NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 2, 28, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());
    }
}
