//! # Task Template Handlers
//!
//! CRUD over task templates plus duplicate, toggle, stats and instantiation.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::constants::TaskType;
use crate::models::{
    PageRequest, Paginated, TaskTemplate, TaskTemplateWithChecklists, TaskWithChecklists,
    TemplateFilter, TemplateStats,
};
use crate::templates::{InstantiateOptions, NewTaskTemplate, TemplateUpdate};
use crate::web::errors::ApiResult;
use crate::web::extractors::{ActorId, ApiJson, ApiPath, ApiQuery};
use crate::web::state::AppState;

/// Query parameters for template listing
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateListQuery {
    #[serde(rename = "type")]
    pub task_type: Option<TaskType>,
    pub is_active: Option<bool>,
    pub name: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct DuplicateRequest {
    pub name: String,
}

/// POST /task-templates
pub async fn create_template(
    State(state): State<AppState>,
    actor: ActorId,
    ApiJson(request): ApiJson<NewTaskTemplate>,
) -> ApiResult<(StatusCode, Json<TaskTemplateWithChecklists>)> {
    let created = state.templates.create(request, actor.0).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /task-templates
pub async fn list_templates(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TemplateListQuery>,
) -> ApiResult<Json<Paginated<TaskTemplate>>> {
    let filter = TemplateFilter {
        task_type: query.task_type,
        is_active: query.is_active,
        name: query.name,
    };
    let page = PageRequest::new(query.page, query.per_page);
    Ok(Json(state.templates.list(&filter, page).await?))
}

/// GET /task-templates/stats
pub async fn template_stats(State(state): State<AppState>) -> ApiResult<Json<TemplateStats>> {
    Ok(Json(state.templates.stats().await?))
}

/// GET /task-templates/:id
pub async fn get_template(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<TaskTemplateWithChecklists>> {
    Ok(Json(state.templates.get(id).await?))
}

/// PATCH /task-templates/:id
pub async fn update_template(
    State(state): State<AppState>,
    actor: ActorId,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(update): ApiJson<TemplateUpdate>,
) -> ApiResult<Json<TaskTemplateWithChecklists>> {
    Ok(Json(state.templates.update(id, update, actor.0).await?))
}

/// DELETE /task-templates/:id
pub async fn delete_template(
    State(state): State<AppState>,
    actor: ActorId,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    state.templates.delete(id, actor.0).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /task-templates/:id/toggle
pub async fn toggle_template(
    State(state): State<AppState>,
    actor: ActorId,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<TaskTemplate>> {
    Ok(Json(state.templates.toggle_active(id, actor.0).await?))
}

/// POST /task-templates/:id/duplicate
pub async fn duplicate_template(
    State(state): State<AppState>,
    actor: ActorId,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<DuplicateRequest>,
) -> ApiResult<(StatusCode, Json<TaskTemplateWithChecklists>)> {
    let copy = state.templates.duplicate(id, request.name, actor.0).await?;
    Ok((StatusCode::CREATED, Json(copy)))
}

/// POST /task-templates/:id/instantiate
pub async fn instantiate_template(
    State(state): State<AppState>,
    actor: ActorId,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(options): ApiJson<InstantiateOptions>,
) -> ApiResult<(StatusCode, Json<TaskWithChecklists>)> {
    let task = state.templates.instantiate(id, options, actor.0).await?;
    Ok((StatusCode::CREATED, Json(task)))
}
