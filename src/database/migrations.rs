//! # Schema Management
//!
//! The schema is owned by the SQL files under `migrations/` and applied with the
//! sqlx migrator. At runtime the crate never creates or alters tables; startup
//! verifies that the tables it depends on exist and refuses to continue if any
//! are missing.

use crate::error::{FleetError, Result};
use sqlx::migrate::Migrator;
use sqlx::PgPool;
use tracing::info;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Tables read or written by the core.
pub const REQUIRED_TABLES: &[&str] = &[
    "machines",
    "task_templates",
    "template_checklists",
    "template_steps",
    "tasks",
    "task_transitions",
    "task_checklists",
    "task_steps",
    "inventory_items",
    "stock_movements",
    "machine_inventory",
    "activity_log",
    "reports",
];

/// Apply pending migrations, then verify the resulting schema.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR.run(pool).await?;
    info!(
        migrations = MIGRATOR.iter().count(),
        "Database migrations applied"
    );
    verify_schema(pool).await
}

pub async fn verify_schema(pool: &PgPool) -> Result<()> {
    let present: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT table_name::text
        FROM information_schema.tables
        WHERE table_schema = current_schema() AND table_name = ANY($1)
        "#,
    )
    .bind(REQUIRED_TABLES)
    .fetch_all(pool)
    .await?;

    let missing = missing_tables(&present);
    if !missing.is_empty() {
        return Err(FleetError::Configuration(format!(
            "database schema is missing required tables: {}",
            missing.join(", ")
        )));
    }

    info!(tables = REQUIRED_TABLES.len(), "Database schema verified");
    Ok(())
}

fn missing_tables(present: &[String]) -> Vec<&'static str> {
    REQUIRED_TABLES
        .iter()
        .copied()
        .filter(|table| !present.iter().any(|p| p == table))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tables_reported_in_order() {
        let present: Vec<String> = REQUIRED_TABLES
            .iter()
            .filter(|t| **t != "reports" && **t != "tasks")
            .map(|t| t.to_string())
            .collect();

        assert_eq!(missing_tables(&present), vec!["tasks", "reports"]);
    }

    #[test]
    fn test_complete_schema_has_nothing_missing() {
        let present: Vec<String> = REQUIRED_TABLES.iter().map(|t| t.to_string()).collect();
        assert!(missing_tables(&present).is_empty());
    }
}
