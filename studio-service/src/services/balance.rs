//! Balance and status derivation for purchases and clients.
//!
//! Status rules, first match wins:
//! 1. nothing remaining: paid
//! 2. nothing paid yet: pending
//! 3. money remaining and the last payment is older than the overdue window: overdue
//! 4. otherwise: partial
//!
//! Reading a balance also writes back what it derived: the purchase's stored
//! status and the client's debtor flag. Both writes are idempotent.

use crate::config::BalanceConfig;
use crate::models::{
    BalanceStatus, ClientBalance, PaidTotal, Purchase, PurchaseBalance, PurchaseStatus,
};
use crate::services::database::Database;
use crate::services::exchange_rate::ExchangeRateService;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Whole days from `last_paid` to `now`, never negative.
pub fn days_since(last_paid: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - last_paid).num_days().max(0)
}

pub fn derive_status(
    total: Decimal,
    paid: Decimal,
    days_since_last_paid: Option<i64>,
    overdue_after_days: i64,
) -> BalanceStatus {
    let remaining = total - paid;
    if remaining <= Decimal::ZERO {
        return BalanceStatus::Paid;
    }
    if remaining == total {
        return BalanceStatus::Pending;
    }
    match days_since_last_paid {
        Some(days) if days > overdue_after_days => BalanceStatus::Overdue,
        _ => BalanceStatus::Partial,
    }
}

/// Balance of one purchase given what has been paid against it, already
/// converted into the purchase currency.
pub fn summarize(
    purchase: &Purchase,
    paid: Decimal,
    last_paid_utc: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    overdue_after_days: i64,
) -> PurchaseBalance {
    let days_since_last_paid = last_paid_utc.map(|t| days_since(t, now));
    let status = derive_status(
        purchase.total_amount,
        paid,
        days_since_last_paid,
        overdue_after_days,
    );

    PurchaseBalance {
        purchase_id: purchase.purchase_id,
        client_id: purchase.client_id,
        currency: purchase.currency.clone(),
        total: purchase.total_amount,
        paid,
        remaining: (purchase.total_amount - paid).max(Decimal::ZERO),
        status,
        last_paid_utc,
        days_since_last_paid,
    }
}

/// Client status: overdue when any purchase is, else derived from the
/// aggregate without the overdue rule.
pub fn client_status(
    total: Decimal,
    paid: Decimal,
    purchases: &[PurchaseBalance],
) -> BalanceStatus {
    if purchases.iter().any(|p| p.status == BalanceStatus::Overdue) {
        return BalanceStatus::Overdue;
    }
    derive_status(total, paid, None, i64::MAX)
}

pub struct BalanceService {
    db: Arc<Database>,
    rates: Arc<ExchangeRateService>,
    config: BalanceConfig,
}

impl BalanceService {
    pub fn new(db: Arc<Database>, rates: Arc<ExchangeRateService>, config: BalanceConfig) -> Self {
        Self { db, rates, config }
    }

    pub fn reporting_currency(&self) -> &str {
        &self.config.reporting_currency
    }

    /// Balance of a purchase. An overdue purchase marks its client a debtor.
    #[instrument(skip(self))]
    pub async fn purchase_balance(&self, purchase_id: Uuid) -> Result<PurchaseBalance, AppError> {
        let purchase = self
            .db
            .get_purchase(purchase_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Purchase not found")))?;

        let balance = self.compute(&purchase, Utc::now()).await?;
        self.store_status(&purchase, &balance).await?;

        if balance.status == BalanceStatus::Overdue && !purchase.is_cancelled() {
            self.db.set_client_debtor(purchase.client_id, true).await?;
        }

        Ok(balance)
    }

    /// Balance of every non-cancelled purchase of a client, aggregated in the
    /// reporting currency. Purchases in a currency that cannot be converted
    /// are listed but left out of the totals. Sets the debtor flag to "any
    /// purchase overdue".
    #[instrument(skip(self))]
    pub async fn client_balance(&self, client_id: Uuid) -> Result<ClientBalance, AppError> {
        if self.db.get_client(client_id).await?.is_none() {
            return Err(AppError::NotFound(anyhow::anyhow!("Client not found")));
        }

        let now = Utc::now();
        let reporting = self.config.reporting_currency.to_uppercase();
        let purchases = self.db.list_client_open_purchases(client_id).await?;

        let mut balances = Vec::with_capacity(purchases.len());
        let mut total = Decimal::ZERO;
        let mut paid = Decimal::ZERO;

        for purchase in &purchases {
            let balance = self.compute(purchase, now).await?;
            self.store_status(purchase, &balance).await?;

            let converted = (
                self.rates
                    .convert(balance.total, &balance.currency, &reporting)
                    .await,
                self.rates
                    .convert(balance.paid, &balance.currency, &reporting)
                    .await,
            );
            match converted {
                (Ok(purchase_total), Ok(purchase_paid)) => {
                    total += purchase_total;
                    paid += purchase_paid;
                }
                (Err(e), _) | (_, Err(e)) => warn!(
                    purchase_id = %balance.purchase_id,
                    currency = %balance.currency,
                    error = %e,
                    "Left purchase out of the client total"
                ),
            }
            balances.push(balance);
        }

        let status = client_status(total, paid, &balances);
        let is_debtor = status == BalanceStatus::Overdue;
        self.db.set_client_debtor(client_id, is_debtor).await?;

        Ok(ClientBalance {
            client_id,
            currency: reporting,
            total,
            paid,
            remaining: (total - paid).max(Decimal::ZERO),
            status,
            is_debtor,
            purchases: balances,
        })
    }

    /// Recompute after money moved on a purchase: its stored status and its
    /// client's debtor flag.
    #[instrument(skip(self))]
    pub async fn refresh_after_payment(
        &self,
        purchase_id: Uuid,
    ) -> Result<PurchaseBalance, AppError> {
        let balance = self.purchase_balance(purchase_id).await?;
        let client = self.client_balance(balance.client_id).await?;
        info!(
            purchase_id = %purchase_id,
            status = balance.status.as_str(),
            client_debtor = client.is_debtor,
            "Balances refreshed"
        );
        Ok(balance)
    }

    /// Reject a payment that would take the paid sum past the purchase total.
    /// `paid` is read under the purchase lock the payment will be written with.
    pub async fn ensure_within_total(
        &self,
        purchase: &Purchase,
        paid: &[PaidTotal],
        amount: Decimal,
        currency: &str,
    ) -> Result<(), AppError> {
        let converted = self
            .rates
            .convert(amount, currency, &purchase.currency)
            .await?;
        let (paid, _) = self.sum_paid(purchase, paid).await?;
        let remaining = (purchase.total_amount - paid).max(Decimal::ZERO);

        if converted > remaining {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment of {} {} exceeds the remaining balance of {} {}",
                converted,
                purchase.currency,
                remaining,
                purchase.currency
            )));
        }
        Ok(())
    }

    /// Make sure a payment currency can be converted into the purchase's.
    pub fn ensure_convertible(&self, purchase: &Purchase, currency: &str) -> Result<(), AppError> {
        if currency.eq_ignore_ascii_case(&purchase.currency)
            || (self.rates.supports(currency) && self.rates.supports(&purchase.currency))
        {
            return Ok(());
        }
        Err(AppError::BadRequest(anyhow::anyhow!(
            "Payments in {} cannot be applied to a purchase in {}",
            currency.to_uppercase(),
            purchase.currency
        )))
    }

    async fn compute(
        &self,
        purchase: &Purchase,
        now: DateTime<Utc>,
    ) -> Result<PurchaseBalance, AppError> {
        let (paid, last_paid_utc) = self.paid_in_purchase_currency(purchase).await?;
        Ok(summarize(
            purchase,
            paid,
            last_paid_utc,
            now,
            self.config.overdue_after_days,
        ))
    }

    async fn paid_in_purchase_currency(
        &self,
        purchase: &Purchase,
    ) -> Result<(Decimal, Option<DateTime<Utc>>), AppError> {
        let totals = self.db.paid_totals_by_currency(purchase.purchase_id).await?;
        self.sum_paid(purchase, &totals).await
    }

    async fn sum_paid(
        &self,
        purchase: &Purchase,
        totals: &[PaidTotal],
    ) -> Result<(Decimal, Option<DateTime<Utc>>), AppError> {
        let mut paid = Decimal::ZERO;
        let mut last_paid_utc: Option<DateTime<Utc>> = None;
        for total in totals {
            paid += self
                .rates
                .convert(total.amount, &total.currency, &purchase.currency)
                .await?;
            last_paid_utc = last_paid_utc.max(total.last_paid_utc);
        }

        Ok((paid, last_paid_utc))
    }

    async fn store_status(
        &self,
        purchase: &Purchase,
        balance: &PurchaseBalance,
    ) -> Result<(), AppError> {
        if purchase.is_cancelled() {
            return Ok(());
        }
        self.db
            .refresh_purchase_status(purchase.purchase_id, PurchaseStatus::from(balance.status))
            .await?;
        Ok(())
    }
}
