//! # Domain Constants
//!
//! Enumerations shared by the template engine, the ledger and the scheduler.
//! All of them are stored as lowercase TEXT columns and serialized the same way.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::state_machine::TaskStatus;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Kind of field or warehouse work a task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Maintenance,
    Collection,
    Inventory,
    Analytics,
    Repair,
    Cleaning,
    Inspection,
    Other,
}

crate::text_enum!(TaskType, "task type" {
    Maintenance => "maintenance",
    Collection => "collection",
    Inventory => "inventory",
    Analytics => "analytics",
    Repair => "repair",
    Cleaning => "cleaning",
    Inspection => "inspection",
    Other => "other",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

crate::text_enum!(TaskPriority, "task priority" {
    Low => "low",
    Medium => "medium",
    High => "high",
    Urgent => "urgent",
});

/// What a checklist step asks the technician to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    #[default]
    Check,
    Photo,
    Note,
    Measurement,
    Signature,
}

crate::text_enum!(StepType, "step type" {
    Check => "check",
    Photo => "photo",
    Note => "note",
    Measurement => "measurement",
    Signature => "signature",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    In,
    Out,
    Adjustment,
}

crate::text_enum!(MovementType, "movement type" {
    In => "in",
    Out => "out",
    Adjustment => "adjustment",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineStatus {
    #[default]
    Active,
    Inactive,
}

crate::text_enum!(MachineStatus, "machine status" {
    Active => "active",
    Inactive => "inactive",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    DailyStockSummary,
}

crate::text_enum!(ReportType, "report type" {
    DailyStockSummary => "daily_stock_summary",
});

/// Recurrence scope key used for warehouse-wide recurring work.
pub const WAREHOUSE_SCOPE: &str = "warehouse";

/// Entity names used in errors, audit events and the activity log.
pub mod entities {
    pub const MACHINE: &str = "machine";
    pub const TASK: &str = "task";
    pub const TASK_STEP: &str = "task step";
    pub const TASK_TEMPLATE: &str = "task template";
    pub const INVENTORY_ITEM: &str = "inventory item";
    pub const MACHINE_INVENTORY: &str = "machine inventory";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_round_trip_matches_serde() {
        for movement in MovementType::ALL {
            let json = serde_json::to_string(movement).unwrap();
            assert_eq!(json, format!("\"{}\"", movement.as_str()));
            assert_eq!(movement.as_str().parse::<MovementType>().unwrap(), *movement);
        }

        assert_eq!(
            serde_json::to_string(&ReportType::DailyStockSummary).unwrap(),
            "\"daily_stock_summary\""
        );
    }

    #[test]
    fn test_unknown_text_is_rejected() {
        let err = "weekly".parse::<TaskType>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid task type: weekly");
        assert!(TaskPriority::try_from("URGENT".to_string()).is_err());
    }
}
