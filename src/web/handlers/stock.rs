//! # Stock Movement Handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::constants::MovementType;
use crate::ledger::RecordMovement;
use crate::models::{MovementFilter, PageRequest, Paginated, StockMovement};
use crate::web::errors::ApiResult;
use crate::web::extractors::{ActorId, ApiJson, ApiQuery};
use crate::web::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementListQuery {
    pub item_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub movement_type: Option<MovementType>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// POST /stock-movements
pub async fn record_movement(
    State(state): State<AppState>,
    actor: ActorId,
    ApiJson(request): ApiJson<RecordMovement>,
) -> ApiResult<(StatusCode, Json<StockMovement>)> {
    let movement = state.ledger.record_movement(request, actor.0).await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

/// GET /stock-movements
pub async fn list_movements(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<MovementListQuery>,
) -> ApiResult<Json<Paginated<StockMovement>>> {
    let filter = MovementFilter {
        item_id: query.item_id,
        user_id: query.user_id,
        movement_type: query.movement_type,
    };
    let page = PageRequest::new(query.page, query.per_page);
    Ok(Json(state.ledger.list_movements(&filter, page).await?))
}
