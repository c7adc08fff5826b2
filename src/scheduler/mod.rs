//! # Recurring Work Scheduler
//!
//! Time-triggered jobs: recurring task generation, retention archival and the
//! daily stock summary. Each job exposes a `run_once(now)` entry point that is
//! safe to call repeatedly; [`CadenceRunner`] drives them in the background.

pub mod cadence;
pub mod policy;
pub mod recurring;
pub mod reporting;
pub mod retention;
pub mod runner;

pub use cadence::Cadence;
pub use policy::{DueOffset, PolicyScope, RecurringPolicy};
pub use recurring::{Scheduler, SchedulerRunReport, UnitOutcome};
pub use reporting::{previous_day_window, ReportingJob, ReportingRunReport};
pub use retention::{RetentionJob, RetentionReport};
pub use runner::{CadenceRunner, ScheduledJob};
