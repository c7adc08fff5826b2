use crate::constants::ReportType;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgExecutor;
use sqlx::FromRow;
use uuid::Uuid;

/// Denormalized daily snapshot keyed by `(report_date, report_type)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: Uuid,
    pub report_date: NaiveDate,
    #[sqlx(try_from = "String")]
    pub report_type: ReportType,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Report {
    /// Insert unless a report for the same date and type exists.
    /// Returns whether a row was written.
    pub async fn insert_if_absent<'e, E>(executor: E, report: &Report) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            INSERT INTO reports (id, report_date, report_type, payload, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (report_date, report_type) DO NOTHING
            "#,
        )
        .bind(report.id)
        .bind(report.report_date)
        .bind(report.report_type.as_str())
        .bind(&report.payload)
        .bind(report.created_at)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn find<'e, E>(
        executor: E,
        report_date: NaiveDate,
        report_type: ReportType,
    ) -> Result<Option<Report>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Report>(
            r#"
            SELECT id, report_date, report_type, payload, created_at
            FROM reports
            WHERE report_date = $1 AND report_type = $2
            "#,
        )
        .bind(report_date)
        .bind(report_type.as_str())
        .fetch_optional(executor)
        .await
    }
}
