//! Purchase model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::BalanceStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Pending,
    Partial,
    Paid,
    Overdue,
    Cancelled,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Partial => "partial",
            PurchaseStatus::Paid => "paid",
            PurchaseStatus::Overdue => "overdue",
            PurchaseStatus::Cancelled => "cancelled",
        }
    }
}

impl From<BalanceStatus> for PurchaseStatus {
    fn from(status: BalanceStatus) -> Self {
        match status {
            BalanceStatus::Paid => PurchaseStatus::Paid,
            BalanceStatus::Partial => PurchaseStatus::Partial,
            BalanceStatus::Pending => PurchaseStatus::Pending,
            BalanceStatus::Overdue => PurchaseStatus::Overdue,
        }
    }
}

/// A sale. Purchases are never deleted; cancelling one only changes its status.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Purchase {
    pub purchase_id: Uuid,
    pub client_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub child_id: Option<Uuid>,
    pub bundle_id: Option<Uuid>,
    pub total_amount: Decimal,
    pub currency: String,
    pub status: String,
    pub is_paid: bool,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Purchase {
    pub fn is_cancelled(&self) -> bool {
        self.status == PurchaseStatus::Cancelled.as_str()
    }
}

/// Input for recording a sale.
///
/// With a bundle, `total_amount` and `currency` default to the bundle's
/// price; without one both are required.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePurchase {
    pub client_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub child_id: Option<Uuid>,
    pub bundle_id: Option<Uuid>,
    pub total_amount: Option<Decimal>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListPurchasesFilter {
    pub client_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    pub status: Option<PurchaseStatus>,
}
