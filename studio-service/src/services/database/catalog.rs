//! Inventory items and bundles.

use super::{db_error, like_pattern, Database};
use crate::models::{
    Bundle, BundleItemDetail, BundleItemInput, BundleWithItems, CreateBundle, CreateInventoryItem,
    InventoryItem, ListBundlesFilter, ListInventoryFilter, Page, UpdateBundle,
    UpdateInventoryItem,
};
use crate::services::metrics::DB_QUERY_DURATION;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::{Postgres, Transaction};
use tracing::{info, instrument, warn};
use uuid::Uuid;

const ITEM_COLUMNS: &str = "item_id, sku, name, description, unit_price, currency, stock_quantity, is_active, created_utc, updated_utc";
const BUNDLE_COLUMNS: &str = "bundle_id, organization_id, name, description, price, currency, is_active, created_utc, updated_utc";

/// Stock at or below this shows up in the low-stock listing.
pub const LOW_STOCK_THRESHOLD: i32 = 5;

fn ensure_non_negative(field: &str, value: Decimal) -> Result<(), AppError> {
    if value < Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "{} must not be negative",
            field
        )));
    }
    Ok(())
}

fn ensure_distinct_items(items: &[BundleItemInput]) -> Result<(), AppError> {
    let mut seen = std::collections::HashSet::new();
    for item in items {
        if !seen.insert(item.item_id) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Item {} is listed more than once",
                item.item_id
            )));
        }
    }
    Ok(())
}

impl Database {
    // =========================================================================
    // Inventory Operations
    // =========================================================================

    #[instrument(skip(self, input), fields(sku = %input.sku))]
    pub async fn create_inventory_item(
        &self,
        input: &CreateInventoryItem,
    ) -> Result<InventoryItem, AppError> {
        ensure_non_negative("unit_price", input.unit_price)?;

        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_inventory_item"])
            .start_timer();

        let item = sqlx::query_as::<_, InventoryItem>(&format!(
            r#"
            INSERT INTO inventory_items (item_id, sku, name, description, unit_price, currency, stock_quantity)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(input.sku.trim())
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.unit_price.round_dp(2))
        .bind(input.currency.to_uppercase())
        .bind(input.stock_quantity)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("create inventory item", e))?;

        timer.observe_duration();
        info!(item_id = %item.item_id, sku = %item.sku, "Inventory item created");

        Ok(item)
    }

    #[instrument(skip(self))]
    pub async fn get_inventory_item(&self, item_id: Uuid) -> Result<Option<InventoryItem>, AppError> {
        sqlx::query_as::<_, InventoryItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items WHERE item_id = $1"
        ))
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("get inventory item", e))
    }

    #[instrument(skip(self, filter))]
    pub async fn list_inventory_items(
        &self,
        filter: &ListInventoryFilter,
        page: Page,
    ) -> Result<Vec<InventoryItem>, AppError> {
        sqlx::query_as::<_, InventoryItem>(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM inventory_items
            WHERE ($1::bool = TRUE OR is_active = TRUE)
              AND ($2::text IS NULL OR name ILIKE $2 OR sku ILIKE $2)
              AND ($3::bool = FALSE OR stock_quantity <= $4)
            ORDER BY name, item_id
            LIMIT $5 OFFSET $6
            "#
        ))
        .bind(filter.include_inactive)
        .bind(filter.search.as_deref().map(like_pattern))
        .bind(filter.low_stock_only)
        .bind(LOW_STOCK_THRESHOLD)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list inventory items", e))
    }

    #[instrument(skip(self, input))]
    pub async fn update_inventory_item(
        &self,
        item_id: Uuid,
        input: &UpdateInventoryItem,
    ) -> Result<Option<InventoryItem>, AppError> {
        if let Some(price) = input.unit_price {
            ensure_non_negative("unit_price", price)?;
        }

        sqlx::query_as::<_, InventoryItem>(&format!(
            r#"
            UPDATE inventory_items
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                unit_price = COALESCE($4, unit_price),
                is_active = COALESCE($5, is_active)
            WHERE item_id = $1
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(item_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.description)
        .bind(input.unit_price.map(|p| p.round_dp(2)))
        .bind(input.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("update inventory item", e))
    }

    /// Apply a stock delta. Stock never goes below zero.
    #[instrument(skip(self))]
    pub async fn adjust_stock(&self, item_id: Uuid, delta: i32) -> Result<InventoryItem, AppError> {
        let item = sqlx::query_as::<_, InventoryItem>(&format!(
            r#"
            UPDATE inventory_items
            SET stock_quantity = stock_quantity + $2
            WHERE item_id = $1 AND stock_quantity + $2 >= 0
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(item_id)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("adjust stock", e))?;

        match item {
            Some(item) => {
                info!(item_id = %item_id, delta = delta, stock = item.stock_quantity, "Stock adjusted");
                Ok(item)
            }
            None => match self.get_inventory_item(item_id).await? {
                Some(existing) => Err(AppError::BadRequest(anyhow::anyhow!(
                    "Insufficient stock for {}: have {}, adjustment {}",
                    existing.sku,
                    existing.stock_quantity,
                    delta
                ))),
                None => Err(AppError::NotFound(anyhow::anyhow!("Inventory item not found"))),
            },
        }
    }

    // =========================================================================
    // Bundle Operations
    // =========================================================================

    #[instrument(skip(self, input))]
    pub async fn create_bundle(&self, input: &CreateBundle) -> Result<BundleWithItems, AppError> {
        ensure_non_negative("price", input.price)?;
        ensure_distinct_items(&input.items)?;

        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_bundle"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("start transaction", e))?;

        let bundle = sqlx::query_as::<_, Bundle>(&format!(
            r#"
            INSERT INTO bundles (bundle_id, organization_id, name, description, price, currency)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {BUNDLE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(input.organization_id)
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.price.round_dp(2))
        .bind(input.currency.to_uppercase())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("create bundle", e))?;

        insert_bundle_items(&mut tx, bundle.bundle_id, &input.items).await?;

        tx.commit()
            .await
            .map_err(|e| db_error("commit bundle", e))?;

        timer.observe_duration();
        info!(bundle_id = %bundle.bundle_id, items = input.items.len(), "Bundle created");

        let items = self.get_bundle_items(bundle.bundle_id).await?;
        Ok(BundleWithItems { bundle, items })
    }

    #[instrument(skip(self))]
    pub async fn get_bundle(&self, bundle_id: Uuid) -> Result<Option<Bundle>, AppError> {
        sqlx::query_as::<_, Bundle>(&format!(
            "SELECT {BUNDLE_COLUMNS} FROM bundles WHERE bundle_id = $1"
        ))
        .bind(bundle_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("get bundle", e))
    }

    #[instrument(skip(self))]
    pub async fn get_bundle_with_items(
        &self,
        bundle_id: Uuid,
    ) -> Result<Option<BundleWithItems>, AppError> {
        let Some(bundle) = self.get_bundle(bundle_id).await? else {
            return Ok(None);
        };
        let items = self.get_bundle_items(bundle_id).await?;
        Ok(Some(BundleWithItems { bundle, items }))
    }

    #[instrument(skip(self))]
    pub async fn get_bundle_items(&self, bundle_id: Uuid) -> Result<Vec<BundleItemDetail>, AppError> {
        sqlx::query_as::<_, BundleItemDetail>(
            r#"
            SELECT bi.item_id, i.sku, i.name, bi.quantity
            FROM bundle_items bi
            JOIN inventory_items i ON i.item_id = bi.item_id
            WHERE bi.bundle_id = $1
            ORDER BY i.name
            "#,
        )
        .bind(bundle_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("get bundle items", e))
    }

    #[instrument(skip(self, filter))]
    pub async fn list_bundles(
        &self,
        filter: &ListBundlesFilter,
        page: Page,
    ) -> Result<Vec<Bundle>, AppError> {
        sqlx::query_as::<_, Bundle>(&format!(
            r#"
            SELECT {BUNDLE_COLUMNS}
            FROM bundles
            WHERE ($1::bool = TRUE OR is_active = TRUE)
              AND ($2::uuid IS NULL OR organization_id = $2 OR organization_id IS NULL)
            ORDER BY name, bundle_id
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(filter.include_inactive)
        .bind(filter.organization_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list bundles", e))
    }

    #[instrument(skip(self, input))]
    pub async fn update_bundle(
        &self,
        bundle_id: Uuid,
        input: &UpdateBundle,
    ) -> Result<Option<Bundle>, AppError> {
        if let Some(price) = input.price {
            ensure_non_negative("price", price)?;
        }

        sqlx::query_as::<_, Bundle>(&format!(
            r#"
            UPDATE bundles
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price)
            WHERE bundle_id = $1
            RETURNING {BUNDLE_COLUMNS}
            "#
        ))
        .bind(bundle_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.description)
        .bind(input.price.map(|p| p.round_dp(2)))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("update bundle", e))
    }

    /// Replace a bundle's contents.
    #[instrument(skip(self, items))]
    pub async fn set_bundle_items(
        &self,
        bundle_id: Uuid,
        items: &[BundleItemInput],
    ) -> Result<Option<BundleWithItems>, AppError> {
        ensure_distinct_items(items)?;

        let Some(bundle) = self.get_bundle(bundle_id).await? else {
            return Ok(None);
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("start transaction", e))?;

        sqlx::query("DELETE FROM bundle_items WHERE bundle_id = $1")
            .bind(bundle_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("clear bundle items", e))?;

        insert_bundle_items(&mut tx, bundle_id, items).await?;

        tx.commit()
            .await
            .map_err(|e| db_error("commit bundle items", e))?;

        let items = self.get_bundle_items(bundle_id).await?;
        Ok(Some(BundleWithItems { bundle, items }))
    }

    #[instrument(skip(self))]
    pub async fn deactivate_bundle(&self, bundle_id: Uuid) -> Result<Option<Bundle>, AppError> {
        sqlx::query_as::<_, Bundle>(&format!(
            r#"
            UPDATE bundles SET is_active = FALSE
            WHERE bundle_id = $1
            RETURNING {BUNDLE_COLUMNS}
            "#
        ))
        .bind(bundle_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("deactivate bundle", e))
    }

    /// Take a bundle's items out of stock as part of a sale.
    pub(crate) async fn consume_bundle_stock(
        tx: &mut Transaction<'_, Postgres>,
        bundle_id: Uuid,
    ) -> Result<(), AppError> {
        let stock: Vec<(String, i32, i32)> = sqlx::query_as(
            r#"
            SELECT i.sku, i.stock_quantity, bi.quantity
            FROM bundle_items bi
            JOIN inventory_items i ON i.item_id = bi.item_id
            WHERE bi.bundle_id = $1
            FOR UPDATE OF i
            "#,
        )
        .bind(bundle_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| db_error("check bundle stock", e))?;

        if let Some((sku, have, need)) = stock.iter().find(|(_, have, need)| have < need) {
            warn!(bundle_id = %bundle_id, sku = %sku, have = have, need = need, "Insufficient stock for sale");
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Insufficient stock for {}: have {}, need {}",
                sku,
                have,
                need
            )));
        }

        sqlx::query(
            r#"
            UPDATE inventory_items i
            SET stock_quantity = i.stock_quantity - bi.quantity
            FROM bundle_items bi
            WHERE bi.bundle_id = $1 AND bi.item_id = i.item_id
            "#,
        )
        .bind(bundle_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| db_error("consume bundle stock", e))?;

        Ok(())
    }
}

async fn insert_bundle_items(
    tx: &mut Transaction<'_, Postgres>,
    bundle_id: Uuid,
    items: &[BundleItemInput],
) -> Result<(), AppError> {
    for item in items {
        sqlx::query("INSERT INTO bundle_items (bundle_id, item_id, quantity) VALUES ($1, $2, $3)")
            .bind(bundle_id)
            .bind(item.item_id)
            .bind(item.quantity)
            .execute(&mut **tx)
            .await
            .map_err(|e| db_error("add bundle item", e))?;
    }
    Ok(())
}
