use super::calculation::apply_movement;
use super::machine_stock::BinChange;
use crate::clock::Clock;
use crate::constants::{entities, MovementType};
use crate::database::error_codes::{database_error_details, PgErrorCode};
use crate::database::with_transient_retry;
use crate::error::{FleetError, Result};
use crate::events::{AuditEvent, Auditor, EventPublisher, FleetEvent};
use crate::logging::log_stock_operation;
use crate::models::{
    ActivityLogEntry, InventoryItem, ItemSearch, Machine, MachineInventory, MovementFilter,
    NewInventoryItem, PageRequest, Paginated, StockMovement,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// A request to move stock of one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMovement {
    pub item_id: Uuid,
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    /// Amount moved; required for `in`/`out`, ignored for `adjustment`
    pub quantity: Option<i64>,
    /// Target balance; required for `adjustment`
    pub quantity_after: Option<i64>,
    pub reason: String,
    pub machine_id: Option<Uuid>,
    pub reference: Option<String>,
}

/// Central warehouse ledger.
#[derive(Clone)]
pub struct StockLedger {
    pool: PgPool,
    clock: Arc<dyn Clock>,
    auditor: Auditor,
    events: EventPublisher,
    retry_backoff: Duration,
}

impl std::fmt::Debug for StockLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockLedger")
            .field("pool", &"PgPool")
            .field("retry_backoff", &self.retry_backoff)
            .finish()
    }
}

impl StockLedger {
    pub fn new(
        pool: PgPool,
        clock: Arc<dyn Clock>,
        auditor: Auditor,
        events: EventPublisher,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            pool,
            clock,
            auditor,
            events,
            retry_backoff,
        }
    }

    /// Register a new item with an empty balance.
    pub async fn create_item(
        &self,
        new_item: NewInventoryItem,
        actor_id: Option<Uuid>,
    ) -> Result<InventoryItem> {
        if new_item.sku.trim().is_empty() || new_item.name.trim().is_empty() {
            return Err(FleetError::validation("sku and name must not be empty"));
        }
        if new_item.min_quantity < 0 {
            return Err(FleetError::InvalidQuantity(format!(
                "minQuantity must not be negative, got {}",
                new_item.min_quantity
            )));
        }
        if new_item.max_quantity.is_some_and(|max| max < new_item.min_quantity) {
            return Err(FleetError::validation(
                "maxQuantity must not be below minQuantity",
            ));
        }

        let sku = new_item.sku.clone();
        let item = InventoryItem::create(&self.pool, new_item, self.clock.now())
            .await
            .map_err(|err| match database_error_details(&err) {
                Some((code, _)) if PgErrorCode::is_unique_violation(&code) => {
                    FleetError::Conflict(format!("sku {sku} already exists"))
                }
                _ => err.into(),
            })?;

        self.auditor
            .record(AuditEvent::new(
                actor_id,
                "inventory_item.create",
                entities::INVENTORY_ITEM,
                item.id,
                json!({ "sku": item.sku }),
            ))
            .await;
        Ok(item)
    }

    /// Record one movement and move the item balance to its `quantity_after`.
    ///
    /// The item row is locked before the balance is read, so concurrent
    /// movements on the same item apply one after the other.
    pub async fn record_movement(
        &self,
        request: RecordMovement,
        actor_id: Option<Uuid>,
    ) -> Result<StockMovement> {
        if request.reason.trim().is_empty() {
            return Err(FleetError::validation("reason must not be empty"));
        }

        let (movement, item) = with_transient_retry("ledger.record_movement", self.retry_backoff, || {
            self.record_once(&request, actor_id)
        })
        .await?;

        log_stock_operation(
            "record_movement",
            movement.item_id,
            Some(movement.movement_type.as_str()),
            movement.quantity_before,
            movement.quantity_after,
            movement.machine_id,
        );
        self.after_commit(&movement, &item, actor_id).await;
        Ok(movement)
    }

    async fn record_once(
        &self,
        request: &RecordMovement,
        actor_id: Option<Uuid>,
    ) -> Result<(StockMovement, InventoryItem)> {
        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;

        if let Some(machine_id) = request.machine_id {
            Machine::find_by_id(&mut *tx, machine_id)
                .await?
                .ok_or_else(|| FleetError::not_found(entities::MACHINE, machine_id))?;
        }

        let mut item = InventoryItem::lock_for_update(&mut tx, request.item_id)
            .await?
            .ok_or_else(|| FleetError::not_found(entities::INVENTORY_ITEM, request.item_id))?;

        let movement = write_movement(
            &mut tx,
            &mut item,
            request.movement_type,
            request.quantity,
            request.quantity_after,
            request.reason.trim().to_string(),
            request.machine_id,
            request.reference.clone(),
            actor_id,
            now,
        )
        .await?;

        tx.commit().await?;
        Ok((movement, item))
    }

    /// Move stock from the central pool into a machine bin.
    ///
    /// One transaction records an `out` movement with machine context, raises
    /// the bin by the same amount and writes an activity-log row.
    pub async fn refill_machine(
        &self,
        machine_id: Uuid,
        item_id: Uuid,
        quantity: i64,
        actor_id: Option<Uuid>,
    ) -> Result<(StockMovement, MachineInventory)> {
        let (movement, item, bin) =
            with_transient_retry("ledger.refill_machine", self.retry_backoff, || {
                self.refill_once(machine_id, item_id, quantity, actor_id)
            })
            .await?;

        log_stock_operation(
            "refill_machine",
            item_id,
            Some(movement.movement_type.as_str()),
            movement.quantity_before,
            movement.quantity_after,
            Some(machine_id),
        );
        info!(
            machine_id = %machine_id,
            item_id = %item_id,
            bin_quantity = bin.quantity,
            "Machine bin refilled"
        );
        self.after_commit(&movement, &item, actor_id).await;
        Ok((movement, bin))
    }

    async fn refill_once(
        &self,
        machine_id: Uuid,
        item_id: Uuid,
        quantity: i64,
        actor_id: Option<Uuid>,
    ) -> Result<(StockMovement, InventoryItem, MachineInventory)> {
        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;

        let machine = Machine::find_by_id(&mut *tx, machine_id)
            .await?
            .ok_or_else(|| FleetError::not_found(entities::MACHINE, machine_id))?;
        let mut item = InventoryItem::lock_for_update(&mut tx, item_id)
            .await?
            .ok_or_else(|| FleetError::not_found(entities::INVENTORY_ITEM, item_id))?;

        let movement = write_movement(
            &mut tx,
            &mut item,
            MovementType::Out,
            Some(quantity),
            None,
            format!("refill machine {}", machine.code),
            Some(machine_id),
            None,
            actor_id,
            now,
        )
        .await?;

        let mut bin = MachineInventory::lock_or_create(&mut tx, machine_id, item_id, now).await?;
        let before = bin.quantity;
        bin.quantity = BinChange::Refill { quantity }.apply(bin.id, bin.quantity, bin.capacity)?;
        bin.updated_at = now;
        MachineInventory::set_quantity(&mut *tx, bin.id, bin.quantity, now).await?;

        ActivityLogEntry::insert(
            &mut *tx,
            &ActivityLogEntry::new(
                actor_id,
                "machine_inventory.refill",
                entities::MACHINE_INVENTORY,
                bin.id,
                json!({
                    "machineId": machine_id,
                    "itemId": item_id,
                    "movementId": movement.id,
                    "quantityBefore": before,
                    "quantityAfter": bin.quantity,
                    "delta": bin.quantity - before,
                }),
                now,
            ),
        )
        .await?;

        tx.commit().await?;
        Ok((movement, item, bin))
    }

    pub async fn list_movements(
        &self,
        filter: &MovementFilter,
        page: PageRequest,
    ) -> Result<Paginated<StockMovement>> {
        let mut conn = self.pool.acquire().await?;
        let (movements, total) = StockMovement::list(&mut conn, filter, page).await?;
        Ok(Paginated::new(movements, page, total))
    }

    pub async fn search_items(
        &self,
        search: &ItemSearch,
        page: PageRequest,
    ) -> Result<Paginated<InventoryItem>> {
        let mut conn = self.pool.acquire().await?;
        let (items, total) = InventoryItem::search(&mut conn, search, page).await?;
        Ok(Paginated::new(items, page, total))
    }

    pub async fn get_item(&self, item_id: Uuid) -> Result<InventoryItem> {
        InventoryItem::find_by_id(&self.pool, item_id)
            .await?
            .ok_or_else(|| FleetError::not_found(entities::INVENTORY_ITEM, item_id))
    }

    /// Items with `quantity <= min_quantity`.
    pub async fn low_stock(&self) -> Result<Vec<InventoryItem>> {
        Ok(InventoryItem::low_stock(&self.pool).await?)
    }

    async fn after_commit(&self, movement: &StockMovement, item: &InventoryItem, actor_id: Option<Uuid>) {
        if item.is_low_stock() {
            tracing::warn!(
                item_id = %item.id,
                sku = %item.sku,
                quantity = item.quantity,
                min_quantity = item.min_quantity,
                "Low stock detected"
            );
            self.events.publish(
                FleetEvent::LowStockDetected {
                    item_id: item.id,
                    sku: item.sku.clone(),
                    quantity: item.quantity,
                    min_quantity: item.min_quantity,
                },
                self.clock.now(),
            );
        }

        self.auditor
            .record(AuditEvent::new(
                actor_id,
                format!("stock_movement.{}", movement.movement_type),
                entities::INVENTORY_ITEM,
                movement.item_id,
                json!({
                    "movementId": movement.id,
                    "quantity": movement.quantity,
                    "quantityBefore": movement.quantity_before,
                    "quantityAfter": movement.quantity_after,
                    "machineId": movement.machine_id,
                }),
            ))
            .await;
    }
}

/// Compute, insert and apply a movement against an item locked by the caller.
#[allow(clippy::too_many_arguments)]
async fn write_movement(
    conn: &mut PgConnection,
    item: &mut InventoryItem,
    movement_type: MovementType,
    quantity: Option<i64>,
    quantity_after: Option<i64>,
    reason: String,
    machine_id: Option<Uuid>,
    reference: Option<String>,
    user_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<StockMovement> {
    let outcome = apply_movement(item.id, item.quantity, movement_type, quantity, quantity_after)?;

    let movement = StockMovement {
        id: Uuid::new_v4(),
        item_id: item.id,
        movement_type,
        quantity: outcome.quantity,
        quantity_before: outcome.quantity_before,
        quantity_after: outcome.quantity_after,
        reason,
        machine_id,
        reference,
        user_id,
        created_at: now,
    };
    StockMovement::insert(&mut *conn, &movement).await?;
    InventoryItem::set_quantity(&mut *conn, item.id, outcome.quantity_after, now).await?;

    item.quantity = outcome.quantity_after;
    item.updated_at = now;
    Ok(movement)
}
