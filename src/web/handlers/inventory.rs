//! # Inventory Handlers
//!
//! Central warehouse items, low-stock listing, and per-machine bins.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FleetError;
use crate::ledger::BinChange;
use crate::models::{
    InventoryItem, ItemSearch, MachineInventory, NewInventoryItem, PageRequest, Paginated,
    StockMovement,
};
use crate::web::errors::ApiResult;
use crate::web::extractors::{ActorId, ApiJson, ApiPath, ApiQuery};
use crate::web::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSearchQuery {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Body of `PATCH /machine-inventory/:id`: either a counted `quantity` or a
/// `drawdown` of units taken out of the bin.
#[derive(Debug, Default, Deserialize)]
pub struct BinUpdateRequest {
    pub quantity: Option<i64>,
    pub drawdown: Option<i64>,
}

impl BinUpdateRequest {
    pub fn into_change(self) -> Result<BinChange, FleetError> {
        match (self.quantity, self.drawdown) {
            (Some(quantity), None) => Ok(BinChange::SetLevel { quantity }),
            (None, Some(quantity)) => Ok(BinChange::Drawdown { quantity }),
            _ => Err(FleetError::validation(
                "exactly one of quantity or drawdown is required",
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefillRequest {
    pub item_id: Uuid,
    pub quantity: i64,
}

#[derive(Debug, Serialize)]
pub struct RefillResponse {
    pub movement: StockMovement,
    pub bin: MachineInventory,
}

/// POST /inventory/items
pub async fn create_item(
    State(state): State<AppState>,
    actor: ActorId,
    ApiJson(request): ApiJson<NewInventoryItem>,
) -> ApiResult<(StatusCode, Json<InventoryItem>)> {
    let item = state.ledger.create_item(request, actor.0).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// GET /inventory/items
pub async fn search_items(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ItemSearchQuery>,
) -> ApiResult<Json<Paginated<InventoryItem>>> {
    let search = ItemSearch {
        sku: query.sku,
        name: query.name,
    };
    let page = PageRequest::new(query.page, query.per_page);
    Ok(Json(state.ledger.search_items(&search, page).await?))
}

/// GET /inventory/items/:id
pub async fn get_item(
    State(state): State<AppState>,
    ApiPath(item_id): ApiPath<Uuid>,
) -> ApiResult<Json<InventoryItem>> {
    Ok(Json(state.ledger.get_item(item_id).await?))
}

/// GET /inventory/low-stock
pub async fn low_stock(State(state): State<AppState>) -> ApiResult<Json<Vec<InventoryItem>>> {
    Ok(Json(state.ledger.low_stock().await?))
}

/// GET /machine-inventory/:id
pub async fn get_bin(
    State(state): State<AppState>,
    ApiPath(bin_id): ApiPath<Uuid>,
) -> ApiResult<Json<MachineInventory>> {
    Ok(Json(state.machine_stock.get(bin_id).await?))
}

/// PATCH /machine-inventory/:id
pub async fn update_bin(
    State(state): State<AppState>,
    actor: ActorId,
    ApiPath(bin_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<BinUpdateRequest>,
) -> ApiResult<Json<MachineInventory>> {
    let change = request.into_change()?;
    let bin = state.machine_stock.apply(bin_id, change, actor.0).await?;
    Ok(Json(bin))
}

/// POST /machines/:id/refill
pub async fn refill_machine(
    State(state): State<AppState>,
    actor: ActorId,
    ApiPath(machine_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<RefillRequest>,
) -> ApiResult<(StatusCode, Json<RefillResponse>)> {
    let (movement, bin) = state
        .ledger
        .refill_machine(machine_id, request.item_id, request.quantity, actor.0)
        .await?;
    Ok((StatusCode::CREATED, Json(RefillResponse { movement, bin })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bin_update_picks_one_change() {
        let set: BinUpdateRequest = serde_json::from_str(r#"{"quantity": 15}"#).unwrap();
        assert_eq!(set.into_change().unwrap(), BinChange::SetLevel { quantity: 15 });

        let drawdown: BinUpdateRequest = serde_json::from_str(r#"{"drawdown": 3}"#).unwrap();
        assert_eq!(drawdown.into_change().unwrap(), BinChange::Drawdown { quantity: 3 });

        let both: BinUpdateRequest =
            serde_json::from_str(r#"{"quantity": 15, "drawdown": 3}"#).unwrap();
        assert!(both.into_change().is_err());
        assert!(BinUpdateRequest::default().into_change().is_err());
    }
}
