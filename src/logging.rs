//! # Structured Logging Module
//!
//! Environment-aware structured logging for the scheduler, the ledger and the
//! HTTP surface. Every helper below emits one line per operation with entity
//! identifiers as fields, so a failed unit of work can be replayed by hand.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// `RUST_LOG` wins over the per-environment default level. Set
/// `FLEETOPS_LOG_FORMAT=json` for machine-readable output.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));
        let json = std::env::var("FLEETOPS_LOG_FORMAT").is_ok_and(|f| f == "json");

        let layer = if json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // A subscriber may already be installed (tests, embedding processes)
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            json = json,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("FLEETOPS_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "test" => "debug".to_string(),
        "development" => "debug".to_string(),
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for task operations
pub fn log_task_operation(
    operation: &str,
    task_id: Uuid,
    task_type: &str,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        task_id = %task_id,
        task_type = %task_type,
        status = %status,
        details = details,
        "📋 TASK_OPERATION"
    );
}

/// Log structured data for ledger operations
pub fn log_stock_operation(
    operation: &str,
    item_id: Uuid,
    movement_type: Option<&str>,
    quantity_before: i64,
    quantity_after: i64,
    machine_id: Option<Uuid>,
) {
    tracing::info!(
        operation = %operation,
        item_id = %item_id,
        movement_type = movement_type,
        quantity_before = quantity_before,
        quantity_after = quantity_after,
        machine_id = machine_id.map(|id| id.to_string()),
        "📦 STOCK_OPERATION"
    );
}

/// Log the outcome of one scheduler unit of work (machine x policy, task, day)
pub fn log_scheduler_unit(job: &str, scope: &str, task_type: Option<&str>, outcome: &str) {
    tracing::info!(
        job = %job,
        scope = %scope,
        task_type = task_type,
        outcome = %outcome,
        "⏰ SCHEDULER_UNIT"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        "❌ ERROR"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_detection() {
        std::env::set_var("FLEETOPS_ENV", "test_override");
        let env = get_environment();
        assert_eq!(env, "test_override");
        std::env::remove_var("FLEETOPS_ENV");
    }

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("test"), "debug");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("unknown"), "debug");
    }
}
