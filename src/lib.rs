#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # FleetOps Core
//!
//! Recurring task generation, checklist templates and the inventory stock
//! ledger for a vending-machine fleet.
//!
//! ## Overview
//!
//! The crate owns the parts of fleet operations that carry real invariants:
//!
//! - A **scheduler** that derives collection, maintenance, inventory and
//!   analytics work for active machines and the warehouse, keeping at most one
//!   live instance of each recurring task per scope.
//! - A **template engine** that deep-copies a reusable checklist/step tree into
//!   a concrete task, so later template edits never touch existing tasks.
//! - A **stock ledger** that records every quantity change as an immutable
//!   movement while keeping live balances consistent under concurrent writers.
//!
//! Around those sit the task lifecycle state machine, retention archival, the
//! daily stock summary and a thin HTTP surface.
//!
//! ## Module Organization
//!
//! - [`models`] - Persisted row types and their queries
//! - [`database`] - Pool, migrations, SQLSTATE classification and retry
//! - [`templates`] - Template authoring and instantiation
//! - [`ledger`] - Central stock movements and machine bins
//! - [`scheduler`] - Task generation, retention, reporting and cadence loops
//! - [`state_machine`] - Task lifecycle transitions
//! - [`tasks`] - Task reads, lifecycle events and step completion
//! - [`events`] - Domain event broadcast and audit hook
//! - [`config`] - Layered configuration
//! - [`web`] - Axum router
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fleetops_core::clock::SystemClock;
//! use fleetops_core::config::FleetConfig;
//! use fleetops_core::scheduler::Scheduler;
//! use fleetops_core::web::AppState;
//! use sqlx::PgPool;
//! use std::sync::Arc;
//!
//! # async fn example(pool: PgPool) -> fleetops_core::Result<()> {
//! let config = FleetConfig::default();
//! let state = AppState::new(pool.clone(), Arc::new(SystemClock), &config);
//!
//! let scheduler = Scheduler::new(
//!     pool,
//!     state.templates.clone(),
//!     config.scheduler.policies.clone(),
//!     config.scheduler.unit_timeout(),
//! );
//! let report = scheduler.run_once(chrono::Utc::now()).await?;
//! println!("created {} recurring tasks", report.created);
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! Integration tests use SQLx native testing with automatic database isolation
//! and require `DATABASE_URL`:
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # All tests
//! ```

#[macro_use]
pub mod macros;

pub mod clock;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod events;
pub mod ledger;
pub mod logging;
pub mod models;
pub mod scheduler;
pub mod state_machine;
pub mod tasks;
pub mod templates;
pub mod web;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigManager, FleetConfig};
pub use constants::{MovementType, TaskPriority, TaskStatus, TaskType};
pub use database::DatabaseConnection;
pub use error::{FleetError, Result};
pub use events::{Auditor, EventPublisher, FleetEvent};
pub use ledger::{MachineStock, StockLedger};
pub use scheduler::{ReportingJob, RetentionJob, Scheduler};
pub use state_machine::{TaskEvent, TaskStateMachine};
pub use tasks::TaskService;
pub use templates::TemplateEngine;
