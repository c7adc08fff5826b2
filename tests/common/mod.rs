//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use fleetops_core::clock::FixedClock;
use fleetops_core::config::FleetConfig;
use fleetops_core::constants::{MachineStatus, StepType, TaskPriority, TaskType};
use fleetops_core::events::{Auditor, EventPublisher};
use fleetops_core::models::{InventoryItem, Machine, NewInventoryItem, NewMachine};
use fleetops_core::templates::{ChecklistDefinition, NewTaskTemplate, StepDefinition};
use fleetops_core::web::AppState;
use sqlx::PgPool;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

static COUNTER: AtomicU32 = AtomicU32::new(0);

pub fn unique_name(prefix: &str) -> String {
    format!("{prefix}-{}", COUNTER.fetch_add(1, Ordering::SeqCst))
}

/// 2025-03-10 08:00 UTC, a Monday.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap()
}

/// Every service wired against one pool and a pinned clock.
pub struct TestContext {
    pub pool: PgPool,
    pub clock: Arc<FixedClock>,
    pub config: FleetConfig,
    pub state: AppState,
    pub events: EventPublisher,
}

impl TestContext {
    pub fn new(pool: PgPool) -> Self {
        let clock = Arc::new(FixedClock::new(base_time()));
        let mut config = FleetConfig::default();
        config.ledger.retry_backoff_ms = 10;
        let events = EventPublisher::new(64);
        let state = AppState::with_services(
            pool.clone(),
            clock.clone(),
            &config,
            Auditor::tracing(Duration::from_millis(200)),
            events.clone(),
        );
        Self {
            pool,
            clock,
            config,
            state,
            events,
        }
    }
}

pub struct MachineFactory {
    code: Option<String>,
    status: MachineStatus,
}

impl MachineFactory {
    pub fn new() -> Self {
        Self {
            code: None,
            status: MachineStatus::Active,
        }
    }

    pub fn with_code(mut self, code: &str) -> Self {
        self.code = Some(code.to_string());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.status = MachineStatus::Inactive;
        self
    }

    pub async fn create(self, pool: &PgPool) -> Machine {
        let code = self.code.unwrap_or_else(|| unique_name("VM"));
        Machine::create(
            pool,
            NewMachine {
                name: format!("Machine {code}"),
                code,
                status: self.status,
                location: Some("Lobby".to_string()),
            },
            base_time(),
        )
        .await
        .expect("Failed to create test Machine")
    }
}

pub struct ItemFactory {
    name: String,
    min_quantity: i64,
}

impl ItemFactory {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            min_quantity: 0,
        }
    }

    pub fn with_min_quantity(mut self, min_quantity: i64) -> Self {
        self.min_quantity = min_quantity;
        self
    }

    /// Create the item and bring it to `quantity` with an `in` movement.
    pub async fn create_with_quantity(self, ctx: &TestContext, quantity: i64) -> InventoryItem {
        let item = ctx
            .state
            .ledger
            .create_item(
                NewInventoryItem {
                    sku: unique_name("SKU"),
                    name: self.name,
                    unit: "kg".to_string(),
                    min_quantity: self.min_quantity,
                    max_quantity: None,
                    price: Some(1.5),
                },
                None,
            )
            .await
            .expect("Failed to create test InventoryItem");

        if quantity > 0 {
            ctx.state
                .ledger
                .record_movement(
                    fleetops_core::ledger::RecordMovement {
                        item_id: item.id,
                        movement_type: fleetops_core::MovementType::In,
                        quantity: Some(quantity),
                        quantity_after: None,
                        reason: "initial stock".to_string(),
                        machine_id: None,
                        reference: None,
                    },
                    None,
                )
                .await
                .expect("Failed to stock test InventoryItem");
        }
        ctx.state.ledger.get_item(item.id).await.unwrap()
    }
}

pub fn step(name: &str) -> StepDefinition {
    StepDefinition {
        name: name.to_string(),
        description: None,
        step_type: StepType::Check,
        is_required: true,
        requires_photo: false,
        requires_note: false,
        validation_rules: None,
    }
}

pub fn checklist(name: &str, steps: &[&str]) -> ChecklistDefinition {
    ChecklistDefinition {
        name: name.to_string(),
        description: None,
        is_required: true,
        steps: steps.iter().map(|s| step(s)).collect(),
    }
}

/// The "Safety" checklist with "Check door" and "Check voltage".
pub fn safety_template(name: &str) -> NewTaskTemplate {
    NewTaskTemplate {
        name: name.to_string(),
        description: Some("Routine maintenance visit".to_string()),
        task_type: TaskType::Maintenance,
        default_priority: TaskPriority::Medium,
        estimated_duration_minutes: 45,
        is_active: true,
        checklists: vec![checklist("Safety", &["Check door", "Check voltage"])],
    }
}
