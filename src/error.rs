//! Error types for the fleet operations core.
//!
//! Every fallible operation in the crate returns [`FleetError`]. The variants follow
//! the failure classes callers need to tell apart: bad input, missing entities,
//! conflicts with existing state, stock shortfalls, illegal lifecycle moves and
//! datastore failures.

use crate::database::error_codes::PgErrorCode;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Another live recurring task already occupies `(task_type, scope)`.
    #[error("A live {task_type} task already exists for scope {scope}")]
    DuplicateRecurringTask { task_type: String, scope: String },

    #[error("Task template {0} is inactive")]
    InactiveTemplate(Uuid),

    #[error("Insufficient stock for {entity} {id}: available {available}, requested {requested}")]
    InsufficientStock {
        entity: &'static str,
        id: Uuid,
        available: i64,
        requested: i64,
    },

    #[error("Invalid transition from {from} on event {event}")]
    InvalidTransition { from: String, event: String },

    #[error("Transaction failure: {0}")]
    Transaction(#[from] sqlx::Error),

    #[error("Migration failure: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Operation '{operation}' timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },
}

pub type Result<T> = std::result::Result<T, FleetError>;

impl FleetError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Stable machine-readable code exposed to API clients.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidQuantity(_) => "INVALID_QUANTITY",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::DuplicateRecurringTask { .. } => "DUPLICATE_RECURRING_TASK",
            Self::InactiveTemplate(_) => "INACTIVE_TEMPLATE",
            Self::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Transaction(_) | Self::Migration(_) => "TRANSACTION_FAILURE",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Timeout { .. } => "TIMEOUT",
        }
    }

    /// Errors caused by the caller's request rather than by the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::InvalidQuantity(_)
                | Self::NotFound { .. }
                | Self::Conflict(_)
                | Self::DuplicateRecurringTask { .. }
                | Self::InactiveTemplate(_)
                | Self::InsufficientStock { .. }
                | Self::InvalidTransition { .. }
        )
    }

    /// Datastore failures worth a single retry: serialization conflicts,
    /// deadlocks and connection-level hiccups.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transaction(sqlx::Error::Database(db_err)) => db_err
                .code()
                .is_some_and(|code| PgErrorCode::is_transient(&code)),
            Self::Transaction(sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_have_stable_codes() {
        let err = FleetError::not_found("task template", Uuid::nil());
        assert!(err.is_client_error());
        assert_eq!(err.error_code(), "NOT_FOUND");
        assert_eq!(
            err.to_string(),
            "task template 00000000-0000-0000-0000-000000000000 not found"
        );

        let err = FleetError::InsufficientStock {
            entity: "inventory item",
            id: Uuid::nil(),
            available: 20,
            requested: 80,
        };
        assert!(err.is_client_error());
        assert_eq!(err.error_code(), "INSUFFICIENT_STOCK");
    }

    #[test]
    fn test_datastore_errors_are_server_errors() {
        let err = FleetError::from(sqlx::Error::RowNotFound);
        assert!(!err.is_client_error());
        assert!(!err.is_transient());
        assert_eq!(err.error_code(), "TRANSACTION_FAILURE");

        assert!(FleetError::from(sqlx::Error::PoolTimedOut).is_transient());
    }
}
