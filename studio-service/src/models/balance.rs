//! Balance views derived from purchases and their payments.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceStatus {
    Paid,
    Partial,
    Pending,
    Overdue,
}

impl BalanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BalanceStatus::Paid => "paid",
            BalanceStatus::Partial => "partial",
            BalanceStatus::Pending => "pending",
            BalanceStatus::Overdue => "overdue",
        }
    }
}

/// Sum of paid payments in one currency for one purchase.
#[derive(Debug, Clone, FromRow)]
pub struct PaidTotal {
    pub currency: String,
    pub amount: Decimal,
    pub last_paid_utc: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseBalance {
    pub purchase_id: Uuid,
    pub client_id: Uuid,
    pub currency: String,
    pub total: Decimal,
    pub paid: Decimal,
    /// Never negative, even when payments exceed the total.
    pub remaining: Decimal,
    pub status: BalanceStatus,
    pub last_paid_utc: Option<DateTime<Utc>>,
    pub days_since_last_paid: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientBalance {
    pub client_id: Uuid,
    pub currency: String,
    pub total: Decimal,
    pub paid: Decimal,
    pub remaining: Decimal,
    pub status: BalanceStatus,
    pub is_debtor: bool,
    pub purchases: Vec<PurchaseBalance>,
}
