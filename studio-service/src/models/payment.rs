//! Payments and installment plans.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Overdue,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Overdue => "overdue",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "paid" => PaymentStatus::Paid,
            "overdue" => PaymentStatus::Overdue,
            "cancelled" => PaymentStatus::Cancelled,
            _ => PaymentStatus::Pending,
        }
    }

    /// Still waiting on money.
    pub fn is_open(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Overdue)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    BankTransfer,
    Mobile,
    Check,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Mobile => "mobile",
            PaymentMethod::Check => "check",
            PaymentMethod::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub payment_id: Uuid,
    pub purchase_id: Uuid,
    pub plan_id: Option<Uuid>,
    /// 0 for a plan's down payment, 1..=n for its installments.
    pub installment_number: Option<i32>,
    pub amount: Decimal,
    pub currency: String,
    pub method: String,
    pub status: String,
    pub due_date: Option<NaiveDate>,
    pub paid_utc: Option<DateTime<Utc>>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Payment {
    pub fn status(&self) -> PaymentStatus {
        PaymentStatus::from_string(&self.status)
    }
}

/// Input for recording a payment against a purchase.
///
/// `status` defaults to paid; a pending payment is a scheduled one and
/// needs a `due_date`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RecordPayment {
    pub amount: Decimal,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    #[serde(default)]
    pub method: PaymentMethod,
    pub status: Option<PaymentStatus>,
    pub due_date: Option<NaiveDate>,
    /// Backdates the payment; defaults to now when paid.
    pub paid_utc: Option<DateTime<Utc>>,
    #[validate(length(max = 100))]
    pub reference: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct MarkPaymentPaid {
    pub paid_utc: Option<DateTime<Utc>>,
    pub method: Option<PaymentMethod>,
    #[validate(length(max = 100))]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanFrequency {
    Weekly,
    Biweekly,
    Monthly,
}

impl PlanFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanFrequency::Weekly => "weekly",
            PlanFrequency::Biweekly => "biweekly",
            PlanFrequency::Monthly => "monthly",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentPlan {
    pub plan_id: Uuid,
    pub purchase_id: Uuid,
    pub total_amount: Decimal,
    pub down_payment: Decimal,
    pub installment_count: i32,
    pub frequency: String,
    pub start_date: NaiveDate,
    pub created_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePaymentPlan {
    /// Defaults to what is left to pay on the purchase.
    pub total_amount: Option<Decimal>,
    pub down_payment: Option<Decimal>,
    #[validate(range(min = 1, max = 120))]
    pub installment_count: i32,
    pub frequency: PlanFrequency,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub method: PaymentMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentPlanWithInstallments {
    #[serde(flatten)]
    pub plan: PaymentPlan,
    pub installments: Vec<Payment>,
}
