use crate::clock::Clock;
use crate::constants::entities;
use crate::database::with_transient_retry;
use crate::error::{FleetError, Result};
use crate::events::{AuditEvent, Auditor};
use crate::logging::log_stock_operation;
use crate::models::{ActivityLogEntry, MachineInventory};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// A change to one machine bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BinChange {
    Refill { quantity: i64 },
    Drawdown { quantity: i64 },
    /// Direct correction to a counted level
    SetLevel { quantity: i64 },
}

impl BinChange {
    pub fn action(&self) -> &'static str {
        match self {
            Self::Refill { .. } => "machine_inventory.refill",
            Self::Drawdown { .. } => "machine_inventory.drawdown",
            Self::SetLevel { .. } => "machine_inventory.set_level",
        }
    }

    /// New bin level, or the reason the change is refused.
    pub fn apply(&self, bin_id: Uuid, current: i64, capacity: Option<i64>) -> Result<i64> {
        let next = match *self {
            Self::Refill { quantity } => {
                if quantity <= 0 {
                    return Err(FleetError::InvalidQuantity(format!(
                        "refill quantity must be positive, got {quantity}"
                    )));
                }
                current.checked_add(quantity).ok_or_else(|| {
                    FleetError::InvalidQuantity(format!("bin overflow adding {quantity}"))
                })?
            }
            Self::Drawdown { quantity } => {
                if quantity <= 0 {
                    return Err(FleetError::InvalidQuantity(format!(
                        "drawdown quantity must be positive, got {quantity}"
                    )));
                }
                if quantity > current {
                    return Err(FleetError::InsufficientStock {
                        entity: entities::MACHINE_INVENTORY,
                        id: bin_id,
                        available: current,
                        requested: quantity,
                    });
                }
                current - quantity
            }
            Self::SetLevel { quantity } => {
                if quantity < 0 {
                    return Err(FleetError::InvalidQuantity(format!(
                        "bin level must not be negative, got {quantity}"
                    )));
                }
                quantity
            }
        };

        if let Some(capacity) = capacity {
            if next > capacity {
                return Err(FleetError::InvalidQuantity(format!(
                    "bin level {next} exceeds capacity {capacity}"
                )));
            }
        }
        Ok(next)
    }
}

/// Per-machine bin levels.
#[derive(Clone)]
pub struct MachineStock {
    pool: PgPool,
    clock: Arc<dyn Clock>,
    auditor: Auditor,
    retry_backoff: Duration,
}

impl std::fmt::Debug for MachineStock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MachineStock")
            .field("pool", &"PgPool")
            .finish()
    }
}

impl MachineStock {
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>, auditor: Auditor, retry_backoff: Duration) -> Self {
        Self {
            pool,
            clock,
            auditor,
            retry_backoff,
        }
    }

    /// Apply a change to a bin under a row lock and log the delta.
    pub async fn apply(
        &self,
        bin_id: Uuid,
        change: BinChange,
        actor_id: Option<Uuid>,
    ) -> Result<MachineInventory> {
        let (bin, before) = with_transient_retry(change.action(), self.retry_backoff, || async {
            let now = self.clock.now();
            let mut tx = self.pool.begin().await?;
            let mut bin = MachineInventory::lock_for_update(&mut tx, bin_id)
                .await?
                .ok_or_else(|| FleetError::not_found(entities::MACHINE_INVENTORY, bin_id))?;

            let before = bin.quantity;
            bin.quantity = change.apply(bin.id, before, bin.capacity)?;
            bin.updated_at = now;
            MachineInventory::set_quantity(&mut *tx, bin.id, bin.quantity, now).await?;

            ActivityLogEntry::insert(
                &mut *tx,
                &ActivityLogEntry::new(
                    actor_id,
                    change.action(),
                    entities::MACHINE_INVENTORY,
                    bin.id,
                    json!({
                        "machineId": bin.machine_id,
                        "itemId": bin.item_id,
                        "quantityBefore": before,
                        "quantityAfter": bin.quantity,
                        "delta": bin.quantity - before,
                    }),
                    now,
                ),
            )
            .await?;

            tx.commit().await?;
            Ok::<_, FleetError>((bin, before))
        })
        .await?;

        log_stock_operation(
            change.action(),
            bin.item_id,
            None,
            before,
            bin.quantity,
            Some(bin.machine_id),
        );
        self.auditor
            .record(AuditEvent::new(
                actor_id,
                change.action(),
                entities::MACHINE_INVENTORY,
                bin.id,
                json!({ "quantityBefore": before, "quantityAfter": bin.quantity }),
            ))
            .await;

        Ok(bin)
    }

    pub async fn get(&self, bin_id: Uuid) -> Result<MachineInventory> {
        MachineInventory::find_by_id(&self.pool, bin_id)
            .await?
            .ok_or_else(|| FleetError::not_found(entities::MACHINE_INVENTORY, bin_id))
    }
}
