//! # Web API Application State
//!
//! Shared services handed to every handler. All services are cheap to clone
//! (they hold the pool and `Arc`s).

use crate::clock::Clock;
use crate::config::FleetConfig;
use crate::events::{Auditor, EventPublisher};
use crate::ledger::{MachineStock, StockLedger};
use crate::tasks::TaskService;
use crate::templates::TemplateEngine;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub clock: Arc<dyn Clock>,
    pub templates: TemplateEngine,
    pub ledger: StockLedger,
    pub machine_stock: MachineStock,
    pub tasks: TaskService,
    pub events: EventPublisher,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("pool", &"PgPool")
            .field("templates", &self.templates)
            .field("ledger", &self.ledger)
            .finish()
    }
}

impl AppState {
    /// Wire every service from configuration with the tracing audit sink.
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>, config: &FleetConfig) -> Self {
        let auditor = Auditor::tracing(Duration::from_millis(config.events.audit_timeout_ms));
        let events = EventPublisher::new(config.events.channel_capacity);
        Self::with_services(pool, clock, config, auditor, events)
    }

    pub fn with_services(
        pool: PgPool,
        clock: Arc<dyn Clock>,
        config: &FleetConfig,
        auditor: Auditor,
        events: EventPublisher,
    ) -> Self {
        let backoff = config.ledger.retry_backoff();
        let templates = TemplateEngine::new(
            pool.clone(),
            clock.clone(),
            auditor.clone(),
            events.clone(),
            backoff,
        );
        let ledger = StockLedger::new(
            pool.clone(),
            clock.clone(),
            auditor.clone(),
            events.clone(),
            backoff,
        );
        let machine_stock = MachineStock::new(pool.clone(), clock.clone(), auditor, backoff);
        let tasks = TaskService::new(pool.clone(), clock.clone());

        info!(
            retry_backoff_ms = backoff.as_millis() as u64,
            "✅ WEB: Application state initialized"
        );

        Self {
            pool,
            clock,
            templates,
            ledger,
            machine_stock,
            tasks,
            events,
        }
    }
}
