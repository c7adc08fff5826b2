//! Recurring work policies: which task types recur, for which scope, and when
//! a freshly generated instance falls due.

use crate::constants::{TaskPriority, TaskType, WAREHOUSE_SCOPE};
use crate::models::Machine;
use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyScope {
    /// One live instance per active machine
    Machine,
    /// One live instance fleet-wide
    Warehouse,
}

/// Distance from generation time to the due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueOffset {
    Days(u32),
    Months(u32),
}

impl DueOffset {
    pub fn apply(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match *self {
            Self::Days(days) => now.checked_add_signed(Duration::days(i64::from(days))),
            Self::Months(months) => now.checked_add_months(Months::new(months)),
        }
    }

    pub fn is_positive(&self) -> bool {
        match *self {
            Self::Days(n) | Self::Months(n) => n > 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringPolicy {
    pub task_type: TaskType,
    pub scope: PolicyScope,
    pub offset: DueOffset,
    pub title: String,
    /// Name of the active template to instantiate; a plain task is created without one
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub priority: TaskPriority,
}

impl RecurringPolicy {
    /// Recurrence scope key for the dedup index.
    pub fn scope_key(&self, machine: Option<&Machine>) -> String {
        match (self.scope, machine) {
            (PolicyScope::Machine, Some(machine)) => machine.id.to_string(),
            _ => WAREHOUSE_SCOPE.to_string(),
        }
    }

    pub fn due_date(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.offset.apply(now)
    }

    /// Task title, suffixed with the machine code for machine-scoped work.
    pub fn task_title(&self, machine: Option<&Machine>) -> String {
        match machine {
            Some(machine) => format!("{} ({})", self.title, machine.code),
            None => self.title.clone(),
        }
    }

    pub fn defaults() -> Vec<RecurringPolicy> {
        vec![
            RecurringPolicy {
                task_type: TaskType::Collection,
                scope: PolicyScope::Machine,
                offset: DueOffset::Days(7),
                title: "Weekly cash collection".to_string(),
                template: None,
                priority: TaskPriority::Medium,
            },
            RecurringPolicy {
                task_type: TaskType::Maintenance,
                scope: PolicyScope::Machine,
                offset: DueOffset::Months(1),
                title: "Monthly maintenance".to_string(),
                template: None,
                priority: TaskPriority::Medium,
            },
            RecurringPolicy {
                task_type: TaskType::Inventory,
                scope: PolicyScope::Warehouse,
                offset: DueOffset::Days(1),
                title: "Daily warehouse stock check".to_string(),
                template: None,
                priority: TaskPriority::Medium,
            },
            RecurringPolicy {
                task_type: TaskType::Analytics,
                scope: PolicyScope::Warehouse,
                offset: DueOffset::Days(7),
                title: "Weekly sales analytics review".to_string(),
                template: None,
                priority: TaskPriority::Low,
            },
        ]
    }
}
