use crate::models::pagination::{contains_pattern, PageRequest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgExecutor;
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

/// A stock-keeping unit in the central warehouse pool.
///
/// `quantity` is only ever written by the stock ledger, as the `quantity_after`
/// of a committed movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub unit: String,
    pub quantity: i64,
    pub min_quantity: i64,
    pub max_quantity: Option<i64>,
    pub price: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInventoryItem {
    pub sku: String,
    pub name: String,
    pub unit: String,
    #[serde(default)]
    pub min_quantity: i64,
    pub max_quantity: Option<i64>,
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemSearch {
    pub sku: Option<String>,
    pub name: Option<String>,
}

const ITEM_COLUMNS: &str =
    "id, sku, name, unit, quantity, min_quantity, max_quantity, price, created_at, updated_at";

impl InventoryItem {
    /// Items start empty; stock arrives through `IN` movements.
    pub async fn create<'e, E>(
        executor: E,
        new_item: NewInventoryItem,
        now: DateTime<Utc>,
    ) -> Result<InventoryItem, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, InventoryItem>(&format!(
            "INSERT INTO inventory_items (id, sku, name, unit, quantity, min_quantity, max_quantity, \
                 price, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, 0, $5, $6, $7, $8, $8) \
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new_item.sku)
        .bind(new_item.name)
        .bind(new_item.unit)
        .bind(new_item.min_quantity)
        .bind(new_item.max_quantity)
        .bind(new_item.price)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<InventoryItem>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, InventoryItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Row-lock the item so concurrent movements serialize on its balance.
    pub async fn lock_for_update(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<InventoryItem>, sqlx::Error> {
        sqlx::query_as::<_, InventoryItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    pub async fn set_quantity<'e, E>(
        executor: E,
        id: Uuid,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query("UPDATE inventory_items SET quantity = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(quantity)
            .bind(now)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Case-insensitive substring search on SKU and/or name.
    pub async fn search(
        conn: &mut PgConnection,
        search: &ItemSearch,
        page: PageRequest,
    ) -> Result<(Vec<InventoryItem>, i64), sqlx::Error> {
        let sku = search.sku.as_deref().map(contains_pattern);
        let name = search.name.as_deref().map(contains_pattern);

        let items = sqlx::query_as::<_, InventoryItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items \
             WHERE ($1::text IS NULL OR sku ILIKE $1) \
               AND ($2::text IS NULL OR name ILIKE $2) \
             ORDER BY name, sku \
             LIMIT $3 OFFSET $4"
        ))
        .bind(&sku)
        .bind(&name)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&mut *conn)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM inventory_items
            WHERE ($1::text IS NULL OR sku ILIKE $1)
              AND ($2::text IS NULL OR name ILIKE $2)
            "#,
        )
        .bind(&sku)
        .bind(&name)
        .fetch_one(&mut *conn)
        .await?;

        Ok((items, total))
    }

    /// Items at or below their reorder threshold, emptiest first.
    pub async fn low_stock<'e, E>(executor: E) -> Result<Vec<InventoryItem>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, InventoryItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items \
             WHERE quantity <= min_quantity \
             ORDER BY quantity, name"
        ))
        .fetch_all(executor)
        .await
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_stock_threshold_is_inclusive() {
        let now = Utc::now();
        let mut item = InventoryItem {
            id: Uuid::new_v4(),
            sku: "SUG-1KG".to_string(),
            name: "Sugar".to_string(),
            unit: "kg".to_string(),
            quantity: 10,
            min_quantity: 10,
            max_quantity: Some(200),
            price: Some(1.5),
            created_at: now,
            updated_at: now,
        };
        assert!(item.is_low_stock());

        item.quantity = 11;
        assert!(!item.is_low_stock());
    }
}
