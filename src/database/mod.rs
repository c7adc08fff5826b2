//! # Database Operations
//!
//! Connection pooling, schema management and transaction helpers shared by the
//! template engine, the stock ledger and the scheduler.
//!
//! - [`connection`] - Pool construction and health checks
//! - [`migrations`] - Migration runner and startup schema verification
//! - [`error_codes`] - PostgreSQL SQLSTATE classification
//! - [`retry`] - Single retry with backoff for transient failures

pub mod connection;
pub mod error_codes;
pub mod migrations;
pub mod retry;

pub use connection::{health_check, DatabaseConnection};
pub use error_codes::PgErrorCode;
pub use migrations::{run_migrations, verify_schema};
pub use retry::with_transient_retry;
