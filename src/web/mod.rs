//! # Web API
//!
//! Axum router over the template engine, the task service and the stock
//! ledger. Handlers are thin: they extract, call one service operation and
//! map [`FleetError`](crate::error::FleetError) through [`errors::ApiError`].

pub mod errors;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod state;

use axum::routing::{get, patch, post};
use axum::Router;

use handlers::{health, inventory, stock, tasks, templates};
pub use state::AppState;

/// Build the full application router with middleware applied.
pub fn create_app(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(health::basic_health))
        .route(
            "/task-templates",
            post(templates::create_template).get(templates::list_templates),
        )
        .route("/task-templates/stats", get(templates::template_stats))
        .route(
            "/task-templates/:id",
            get(templates::get_template)
                .patch(templates::update_template)
                .delete(templates::delete_template),
        )
        .route("/task-templates/:id/toggle", post(templates::toggle_template))
        .route("/task-templates/:id/duplicate", post(templates::duplicate_template))
        .route("/task-templates/:id/instantiate", post(templates::instantiate_template))
        .route("/tasks/:id", get(tasks::get_task))
        .route(
            "/tasks/:id/transitions",
            get(tasks::task_history).post(tasks::transition_task),
        )
        .route("/tasks/:id/steps/:step_id", patch(tasks::complete_step))
        .route(
            "/stock-movements",
            post(stock::record_movement).get(stock::list_movements),
        )
        .route(
            "/inventory/items",
            post(inventory::create_item).get(inventory::search_items),
        )
        .route("/inventory/items/:id", get(inventory::get_item))
        .route("/inventory/low-stock", get(inventory::low_stock))
        .route(
            "/machine-inventory/:id",
            get(inventory::get_bin).patch(inventory::update_bin),
        )
        .route("/machines/:id/refill", post(inventory::refill_machine));

    middleware::apply_middleware_stack(router).with_state(state)
}
