//! Inventory items and the bundles (packages) built from them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InventoryItem {
    pub item_id: Uuid,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub unit_price: Decimal,
    pub currency: String,
    pub stock_quantity: i32,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateInventoryItem {
    #[validate(length(min = 1, max = 64))]
    pub sku: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    pub unit_price: Decimal,
    #[validate(length(equal = 3))]
    pub currency: String,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub stock_quantity: i32,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateInventoryItem {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub unit_price: Option<Decimal>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AdjustStock {
    /// Positive to receive stock, negative to write it off.
    pub delta: i32,
    #[validate(length(max = 200))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListInventoryFilter {
    pub search: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
    #[serde(default)]
    pub low_stock_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Bundle {
    pub bundle_id: Uuid,
    /// `None` for bundles offered to every organization.
    pub organization_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub currency: String,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BundleItemDetail {
    pub item_id: Uuid,
    pub sku: String,
    pub name: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleWithItems {
    #[serde(flatten)]
    pub bundle: Bundle,
    pub items: Vec<BundleItemDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BundleItemInput {
    pub item_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBundle {
    pub organization_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    #[validate(length(equal = 3))]
    pub currency: String,
    #[serde(default)]
    #[validate(nested)]
    pub items: Vec<BundleItemInput>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateBundle {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SetBundleItems {
    #[validate(nested)]
    pub items: Vec<BundleItemInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListBundlesFilter {
    /// Bundles scoped to this organization plus the global ones.
    pub organization_id: Option<Uuid>,
    #[serde(default)]
    pub include_inactive: bool,
}
