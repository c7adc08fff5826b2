//! # Task Handlers
//!
//! Task detail, lifecycle events and checklist step completion for the
//! technician-facing clients.

use axum::extract::State;
use axum::Json;
use tracing::info;
use uuid::Uuid;

use crate::models::{Task, TaskStep, TaskTransition, TaskWithChecklists};
use crate::state_machine::TaskEvent;
use crate::tasks::StepCompletion;
use crate::web::errors::ApiResult;
use crate::web::extractors::{ActorId, ApiJson, ApiPath};
use crate::web::state::AppState;

/// GET /tasks/:id
pub async fn get_task(
    State(state): State<AppState>,
    ApiPath(task_id): ApiPath<Uuid>,
) -> ApiResult<Json<TaskWithChecklists>> {
    Ok(Json(state.tasks.get(task_id).await?))
}

/// GET /tasks/:id/transitions
pub async fn task_history(
    State(state): State<AppState>,
    ApiPath(task_id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<TaskTransition>>> {
    Ok(Json(state.tasks.history(task_id).await?))
}

/// POST /tasks/:id/transitions
pub async fn transition_task(
    State(state): State<AppState>,
    actor: ActorId,
    ApiPath(task_id): ApiPath<Uuid>,
    ApiJson(event): ApiJson<TaskEvent>,
) -> ApiResult<Json<Task>> {
    info!(task_id = %task_id, event = event.event_type(), "Applying task event via web API");
    Ok(Json(state.tasks.transition(task_id, event, actor.0).await?))
}

/// PATCH /tasks/:id/steps/:step_id
pub async fn complete_step(
    State(state): State<AppState>,
    actor: ActorId,
    ApiPath((task_id, step_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(completion): ApiJson<StepCompletion>,
) -> ApiResult<Json<TaskStep>> {
    Ok(Json(
        state
            .tasks
            .complete_step(task_id, step_id, completion, actor.0)
            .await?,
    ))
}
