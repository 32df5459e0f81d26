//! Dashboard and report shapes.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CurrencyAmount {
    pub currency: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub organizations: i64,
    pub clients: i64,
    pub debtors: i64,
    pub purchases_by_status: Vec<StatusCount>,
    pub overdue_payments: i64,
    /// Paid this calendar month, per currency.
    pub collected_this_month: Vec<CurrencyAmount>,
    /// Sum of open (pending/overdue) payments, per currency.
    pub scheduled_outstanding: Vec<CurrencyAmount>,
    pub reporting_currency: String,
    pub collected_this_month_total: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentsReportQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentReportRow {
    pub method: String,
    pub currency: String,
    pub payment_count: i64,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentsReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub rows: Vec<PaymentReportRow>,
    pub totals: Vec<CurrencyAmount>,
}
