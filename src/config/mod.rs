//! # Fleet Operations Configuration
//!
//! Typed configuration for the database pool, the time-triggered jobs, the
//! ledger, event delivery and the HTTP listener. Values come from an optional
//! TOML file layered under `FLEETOPS__*` environment variables; see
//! [`ConfigManager`].
//!
//! ```rust,no_run
//! use fleetops_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let retention_days = manager.config().scheduler.retention_days;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::scheduler::cadence::Cadence;
use crate::scheduler::policy::RecurringPolicy;
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FleetConfig {
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    pub ledger: LedgerConfig,
    pub events: EventConfig,
    pub web: WebConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/fleetops_development".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_seconds: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Spawn the cadence runners at startup
    pub enabled: bool,
    pub generation_cadence: Cadence,
    pub retention_cadence: Cadence,
    pub reporting_cadence: Cadence,
    /// Completed tasks untouched for longer than this are archived
    pub retention_days: u32,
    /// Upper bound on rows archived per retention run
    pub retention_batch_size: i64,
    /// Bound on one unit of scheduler work (one machine and policy)
    pub unit_timeout_ms: u64,
    pub policies: Vec<RecurringPolicy>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            generation_cadence: Cadence::daily(0, 0),
            retention_cadence: Cadence::weekly(Weekday::Sun, 3, 0),
            reporting_cadence: Cadence::daily(2, 0),
            retention_days: 30,
            retention_batch_size: 1000,
            unit_timeout_ms: 5000,
            policies: RecurringPolicy::defaults(),
        }
    }
}

impl SchedulerConfig {
    pub fn unit_timeout(&self) -> Duration {
        Duration::from_millis(self.unit_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Pause before the single retry of a transient datastore failure
    pub retry_backoff_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            retry_backoff_ms: 100,
        }
    }
}

impl LedgerConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EventConfig {
    pub channel_capacity: usize,
    pub audit_timeout_ms: u64,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            audit_timeout_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebConfig {
    pub bind_address: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

impl WebConfig {
    pub fn socket_addr(&self) -> ConfigResult<SocketAddr> {
        self.bind_address.parse().map_err(|_| {
            ConfigurationError::invalid_value(
                "web.bind_address",
                &self.bind_address,
                "expected host:port",
            )
        })
    }
}

impl FleetConfig {
    /// Reject values that would make the process misbehave rather than fail.
    pub fn validate(&self) -> ConfigResult<()> {
        let db = &self.database;
        if db.url.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "database.url",
                "",
                "database url must not be empty",
            ));
        }
        if db.max_connections == 0 {
            return Err(ConfigurationError::invalid_value(
                "database.max_connections",
                db.max_connections,
                "pool needs at least one connection",
            ));
        }
        if db.min_connections > db.max_connections {
            return Err(ConfigurationError::invalid_value(
                "database.min_connections",
                db.min_connections,
                "must not exceed max_connections",
            ));
        }
        if db.acquire_timeout_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "database.acquire_timeout_seconds",
                0,
                "must be positive",
            ));
        }

        let scheduler = &self.scheduler;
        if scheduler.retention_days == 0 {
            return Err(ConfigurationError::invalid_value(
                "scheduler.retention_days",
                0,
                "retention window must be at least one day",
            ));
        }
        if scheduler.retention_batch_size <= 0 {
            return Err(ConfigurationError::invalid_value(
                "scheduler.retention_batch_size",
                scheduler.retention_batch_size,
                "must be positive",
            ));
        }
        if scheduler.unit_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "scheduler.unit_timeout_ms",
                0,
                "must be positive",
            ));
        }
        for (field, cadence) in [
            ("scheduler.generation_cadence", &scheduler.generation_cadence),
            ("scheduler.retention_cadence", &scheduler.retention_cadence),
            ("scheduler.reporting_cadence", &scheduler.reporting_cadence),
        ] {
            if !cadence.is_valid() {
                return Err(ConfigurationError::invalid_value(
                    field,
                    format!("{cadence:?}"),
                    "interval must be at least one second",
                ));
            }
        }

        let mut seen = HashSet::new();
        for policy in &scheduler.policies {
            if !seen.insert((policy.task_type, policy.scope)) {
                return Err(ConfigurationError::validation_error(format!(
                    "duplicate recurring policy for {} ({:?} scope)",
                    policy.task_type, policy.scope
                )));
            }
            if !policy.offset.is_positive() {
                return Err(ConfigurationError::invalid_value(
                    "scheduler.policies.offset",
                    format!("{:?}", policy.offset),
                    format!("offset for {} must be positive", policy.task_type),
                ));
            }
            if policy.title.trim().is_empty() {
                return Err(ConfigurationError::invalid_value(
                    "scheduler.policies.title",
                    "",
                    format!("title for {} must not be empty", policy.task_type),
                ));
            }
        }

        if self.events.channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "events.channel_capacity",
                0,
                "must be positive",
            ));
        }
        if self.events.audit_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "events.audit_timeout_ms",
                0,
                "must be positive",
            ));
        }

        self.web.socket_addr()?;
        Ok(())
    }
}
