//! # Data Models
//!
//! Row types for every persisted entity, each with its queries as associated
//! async functions taking a `PgExecutor` (pool, connection or transaction).

pub mod activity_log;
pub mod inventory_item;
pub mod machine;
pub mod machine_inventory;
pub mod pagination;
pub mod report;
pub mod stock_movement;
pub mod task;
pub mod task_checklist;
pub mod task_template;
pub mod task_transition;
pub mod template_checklist;

// Re-export models for easy access
pub use activity_log::ActivityLogEntry;
pub use inventory_item::{InventoryItem, ItemSearch, NewInventoryItem};
pub use machine::{Machine, NewMachine};
pub use machine_inventory::MachineInventory;
pub use pagination::{PageRequest, Paginated, PaginationInfo};
pub use report::Report;
pub use stock_movement::{MachineItemTotals, MovementFilter, StockMovement};
pub use task::{Task, TaskWithChecklists};
pub use task_checklist::{TaskChecklist, TaskChecklistWithSteps, TaskStep};
pub use task_template::{TaskTemplate, TaskTemplateWithChecklists, TemplateFilter, TemplateStats};
pub use task_transition::TaskTransition;
pub use template_checklist::{TemplateChecklist, TemplateChecklistWithSteps, TemplateStep};
