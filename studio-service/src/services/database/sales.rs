//! Purchases, payments and installment plans.

use super::{db_error, Database};
use crate::models::{
    CreatePaymentPlan, CreatePurchase, ListPurchasesFilter, MarkPaymentPaid, PaidTotal, Page,
    Payment, PaymentPlan, PaymentPlanWithInstallments, PaymentStatus, Purchase, PurchaseStatus,
    RecordPayment,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::payment_plan::PlanSchedule;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::{Postgres, Transaction};
use tracing::{info, instrument, warn};
use uuid::Uuid;

const PURCHASE_COLUMNS: &str = "purchase_id, client_id, organization_id, child_id, bundle_id, total_amount, currency, status, is_paid, notes, created_utc, updated_utc";
const PAYMENT_COLUMNS: &str = "payment_id, purchase_id, plan_id, installment_number, amount, currency, method, status, due_date, paid_utc, reference, notes, created_utc, updated_utc";
const PLAN_COLUMNS: &str = "plan_id, purchase_id, total_amount, down_payment, installment_count, frequency, start_date, created_utc";

/// A purchase row held `FOR UPDATE` together with what has been paid on it.
///
/// Payments that move money go through a lock, so the paid totals checked
/// against the purchase total cannot change before the write commits.
/// Dropping the lock rolls its transaction back.
pub struct PurchaseLock {
    tx: Transaction<'static, Postgres>,
    pub purchase_id: Uuid,
    pub paid: Vec<PaidTotal>,
}

impl Database {
    // =========================================================================
    // Purchase Operations
    // =========================================================================

    /// Record a sale. A bundle sale takes its items out of stock in the same
    /// transaction.
    #[instrument(skip(self, input), fields(client_id = %input.client_id))]
    pub async fn create_purchase(&self, input: &CreatePurchase) -> Result<Purchase, AppError> {
        let client = self
            .get_client(input.client_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;

        let bundle = match input.bundle_id {
            Some(bundle_id) => {
                let bundle = self
                    .get_bundle(bundle_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Bundle not found")))?;
                if !bundle.is_active {
                    return Err(AppError::BadRequest(anyhow::anyhow!(
                        "Bundle {} is no longer offered",
                        bundle.name
                    )));
                }
                Some(bundle)
            }
            None => None,
        };

        let currency = match (&input.currency, &bundle) {
            (Some(currency), _) => currency.to_uppercase(),
            (None, Some(bundle)) => bundle.currency.clone(),
            (None, None) => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "currency is required when no bundle is given"
                )))
            }
        };

        let total = match (input.total_amount, &bundle) {
            (Some(total), _) => total,
            (None, Some(bundle)) if bundle.currency == currency => bundle.price,
            (None, Some(bundle)) => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Bundle is priced in {}; give total_amount to sell it in {}",
                    bundle.currency,
                    currency
                )))
            }
            (None, None) => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "total_amount is required when no bundle is given"
                )))
            }
        };

        if total <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Purchase total must be greater than zero"
            )));
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_purchase"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("start transaction", e))?;

        let purchase = sqlx::query_as::<_, Purchase>(&format!(
            r#"
            INSERT INTO purchases (purchase_id, client_id, organization_id, child_id, bundle_id, total_amount, currency, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PURCHASE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(client.client_id)
        .bind(input.organization_id.or(client.organization_id))
        .bind(input.child_id)
        .bind(input.bundle_id)
        .bind(total)
        .bind(&currency)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("create purchase", e))?;

        if let Some(bundle_id) = purchase.bundle_id {
            Database::consume_bundle_stock(&mut tx, bundle_id).await?;
        }

        tx.commit()
            .await
            .map_err(|e| db_error("commit purchase", e))?;

        timer.observe_duration();
        info!(
            purchase_id = %purchase.purchase_id,
            total = %purchase.total_amount,
            currency = %purchase.currency,
            "Purchase created"
        );

        Ok(purchase)
    }

    #[instrument(skip(self))]
    pub async fn get_purchase(&self, purchase_id: Uuid) -> Result<Option<Purchase>, AppError> {
        sqlx::query_as::<_, Purchase>(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE purchase_id = $1"
        ))
        .bind(purchase_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("get purchase", e))
    }

    #[instrument(skip(self, filter))]
    pub async fn list_purchases(
        &self,
        filter: &ListPurchasesFilter,
        page: Page,
    ) -> Result<Vec<Purchase>, AppError> {
        sqlx::query_as::<_, Purchase>(&format!(
            r#"
            SELECT {PURCHASE_COLUMNS}
            FROM purchases
            WHERE ($1::uuid IS NULL OR client_id = $1)
              AND ($2::uuid IS NULL OR organization_id = $2)
              AND ($3::text IS NULL OR status = $3)
            ORDER BY created_utc DESC, purchase_id
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(filter.client_id)
        .bind(filter.organization_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list purchases", e))
    }

    /// Every purchase of a client that still counts towards its balance.
    #[instrument(skip(self))]
    pub async fn list_client_open_purchases(
        &self,
        client_id: Uuid,
    ) -> Result<Vec<Purchase>, AppError> {
        sqlx::query_as::<_, Purchase>(&format!(
            r#"
            SELECT {PURCHASE_COLUMNS}
            FROM purchases
            WHERE client_id = $1 AND status <> 'cancelled'
            ORDER BY created_utc, purchase_id
            "#
        ))
        .bind(client_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list client purchases", e))
    }

    /// Store a derived status. Cancelled purchases keep their status, and
    /// the row is only written when something changed.
    #[instrument(skip(self))]
    pub async fn refresh_purchase_status(
        &self,
        purchase_id: Uuid,
        status: PurchaseStatus,
    ) -> Result<bool, AppError> {
        let is_paid = status == PurchaseStatus::Paid;
        let result = sqlx::query(
            r#"
            UPDATE purchases
            SET status = $2, is_paid = $3
            WHERE purchase_id = $1
              AND status <> 'cancelled'
              AND (status IS DISTINCT FROM $2 OR is_paid IS DISTINCT FROM $3)
            "#,
        )
        .bind(purchase_id)
        .bind(status.as_str())
        .bind(is_paid)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("refresh purchase status", e))?;

        Ok(result.rows_affected() > 0)
    }

    /// Cancel a sale: its open payments are cancelled and bundle stock is
    /// returned. Paid purchases cannot be cancelled.
    #[instrument(skip(self))]
    pub async fn cancel_purchase(&self, purchase_id: Uuid) -> Result<Option<Purchase>, AppError> {
        let Some(existing) = self.get_purchase(purchase_id).await? else {
            return Ok(None);
        };
        if existing.is_cancelled() {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Purchase is already cancelled"
            )));
        }
        if existing.is_paid {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "A fully paid purchase cannot be cancelled"
            )));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("start transaction", e))?;

        let purchase = sqlx::query_as::<_, Purchase>(&format!(
            r#"
            UPDATE purchases SET status = 'cancelled', is_paid = FALSE
            WHERE purchase_id = $1 AND status <> 'cancelled'
            RETURNING {PURCHASE_COLUMNS}
            "#
        ))
        .bind(purchase_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("cancel purchase", e))?
        .ok_or_else(|| AppError::Conflict(anyhow::anyhow!("Purchase is already cancelled")))?;

        let cancelled = sqlx::query(
            r#"
            UPDATE payments SET status = 'cancelled'
            WHERE purchase_id = $1 AND status IN ('pending', 'overdue')
            "#,
        )
        .bind(purchase_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("cancel purchase payments", e))?
        .rows_affected();

        if let Some(bundle_id) = purchase.bundle_id {
            restore_bundle_stock(&mut tx, bundle_id).await?;
        }

        tx.commit()
            .await
            .map_err(|e| db_error("commit purchase cancellation", e))?;

        info!(purchase_id = %purchase_id, cancelled_payments = cancelled, "Purchase cancelled");
        Ok(Some(purchase))
    }

    // =========================================================================
    // Payment Operations
    // =========================================================================

    /// Lock a purchase for a payment write and read its paid totals under
    /// the lock.
    #[instrument(skip(self))]
    pub async fn lock_purchase(&self, purchase_id: Uuid) -> Result<PurchaseLock, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("start transaction", e))?;

        let status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM purchases WHERE purchase_id = $1 FOR UPDATE",
        )
        .bind(purchase_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("lock purchase", e))?;
        match status.as_deref() {
            None => return Err(AppError::NotFound(anyhow::anyhow!("Purchase not found"))),
            Some("cancelled") => {
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "Purchase {} is cancelled",
                    purchase_id
                )))
            }
            Some(_) => {}
        }

        let paid = query_paid_totals(&mut *tx, purchase_id).await?;
        Ok(PurchaseLock {
            tx,
            purchase_id,
            paid,
        })
    }

    /// Insert a payment, either received now (paid) or scheduled (pending),
    /// and release the lock.
    #[instrument(skip(self, lock, input), fields(purchase_id = %lock.purchase_id, amount = %input.amount))]
    pub async fn insert_payment(
        &self,
        lock: PurchaseLock,
        currency: &str,
        input: &RecordPayment,
    ) -> Result<Payment, AppError> {
        let PurchaseLock {
            mut tx,
            purchase_id,
            ..
        } = lock;
        let status = input.status.unwrap_or(PaymentStatus::Paid);
        let paid_utc = match status {
            PaymentStatus::Paid => Some(input.paid_utc.unwrap_or_else(Utc::now)),
            PaymentStatus::Pending => {
                if input.due_date.is_none() {
                    return Err(AppError::BadRequest(anyhow::anyhow!(
                        "A scheduled payment needs a due_date"
                    )));
                }
                None
            }
            other => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Payments cannot be recorded as {}",
                    other.as_str()
                )))
            }
        };

        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_payment"])
            .start_timer();

        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments (payment_id, purchase_id, amount, currency, method, status, due_date, paid_utc, reference, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(purchase_id)
        .bind(input.amount)
        .bind(currency)
        .bind(input.method.as_str())
        .bind(status.as_str())
        .bind(input.due_date)
        .bind(paid_utc)
        .bind(&input.reference)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("record payment", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("commit payment", e))?;

        timer.observe_duration();
        info!(
            payment_id = %payment.payment_id,
            purchase_id = %purchase_id,
            status = %payment.status,
            "Payment recorded"
        );

        Ok(payment)
    }

    #[instrument(skip(self))]
    pub async fn get_payment(&self, payment_id: Uuid) -> Result<Option<Payment>, AppError> {
        sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE payment_id = $1"
        ))
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("get payment", e))
    }

    #[instrument(skip(self))]
    pub async fn list_payments_for_purchase(
        &self,
        purchase_id: Uuid,
    ) -> Result<Vec<Payment>, AppError> {
        sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM payments
            WHERE purchase_id = $1
            ORDER BY COALESCE(installment_number, 2147483647), due_date NULLS LAST, created_utc
            "#
        ))
        .bind(purchase_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list payments", e))
    }

    /// Paid amounts per currency, with the most recent payment time.
    #[instrument(skip(self))]
    pub async fn paid_totals_by_currency(
        &self,
        purchase_id: Uuid,
    ) -> Result<Vec<PaidTotal>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["paid_totals_by_currency"])
            .start_timer();

        let totals = query_paid_totals(&self.pool, purchase_id).await?;

        timer.observe_duration();
        Ok(totals)
    }

    /// Mark an open payment of the locked purchase paid. When it was the last
    /// open payment of its purchase, the purchase is flagged paid in the same
    /// transaction.
    ///
    /// Returns the payment and whether the purchase was flipped to paid.
    #[instrument(skip(self, lock, input), fields(purchase_id = %lock.purchase_id))]
    pub async fn mark_payment_paid(
        &self,
        lock: PurchaseLock,
        payment_id: Uuid,
        input: &MarkPaymentPaid,
    ) -> Result<(Payment, bool), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["mark_payment_paid"])
            .start_timer();

        let PurchaseLock {
            mut tx,
            purchase_id,
            ..
        } = lock;

        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            UPDATE payments
            SET status = 'paid',
                paid_utc = $2,
                method = COALESCE($3, method),
                reference = COALESCE($4, reference)
            WHERE payment_id = $1 AND purchase_id = $5 AND status IN ('pending', 'overdue')
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment_id)
        .bind(input.paid_utc.unwrap_or_else(Utc::now))
        .bind(input.method.map(|m| m.as_str()))
        .bind(&input.reference)
        .bind(purchase_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("mark payment paid", e))?;

        let Some(payment) = payment else {
            tx.rollback()
                .await
                .map_err(|e| db_error("rollback", e))?;
            return match self.get_payment(payment_id).await? {
                Some(existing) => Err(AppError::Conflict(anyhow::anyhow!(
                    "Payment is already {}",
                    existing.status
                ))),
                None => Err(AppError::NotFound(anyhow::anyhow!("Payment not found"))),
            };
        };

        let flipped = sqlx::query(
            r#"
            UPDATE purchases
            SET is_paid = TRUE, status = 'paid'
            WHERE purchase_id = $1
              AND status <> 'cancelled'
              AND is_paid = FALSE
              AND NOT EXISTS (
                  SELECT 1 FROM payments
                  WHERE purchase_id = $1 AND status IN ('pending', 'overdue')
              )
            "#,
        )
        .bind(payment.purchase_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("flag purchase paid", e))?
        .rows_affected()
            > 0;

        tx.commit()
            .await
            .map_err(|e| db_error("commit payment", e))?;

        timer.observe_duration();
        info!(
            payment_id = %payment_id,
            purchase_id = %payment.purchase_id,
            purchase_paid = flipped,
            "Payment marked paid"
        );

        Ok((payment, flipped))
    }

    /// Void a payment. Cancelled payments stop counting towards balances.
    #[instrument(skip(self))]
    pub async fn cancel_payment(&self, payment_id: Uuid) -> Result<Payment, AppError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            UPDATE payments SET status = 'cancelled'
            WHERE payment_id = $1 AND status <> 'cancelled'
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("cancel payment", e))?;

        match payment {
            Some(payment) => {
                info!(payment_id = %payment_id, purchase_id = %payment.purchase_id, "Payment cancelled");
                Ok(payment)
            }
            None => match self.get_payment(payment_id).await? {
                Some(_) => Err(AppError::Conflict(anyhow::anyhow!(
                    "Payment is already cancelled"
                ))),
                None => Err(AppError::NotFound(anyhow::anyhow!("Payment not found"))),
            },
        }
    }

    /// Flag pending payments due before `today` as overdue.
    ///
    /// Returns the distinct purchases that had payments flagged.
    #[instrument(skip(self))]
    pub async fn mark_overdue_payments(&self, today: NaiveDate) -> Result<Vec<Uuid>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["mark_overdue_payments"])
            .start_timer();

        let purchase_ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            WITH flagged AS (
                UPDATE payments SET status = 'overdue'
                WHERE status = 'pending' AND due_date < $1
                RETURNING purchase_id
            )
            SELECT DISTINCT purchase_id FROM flagged
            "#,
        )
        .bind(today)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("mark overdue payments", e))?;

        timer.observe_duration();
        if !purchase_ids.is_empty() {
            warn!(purchases = purchase_ids.len(), "Payments flagged overdue");
        }

        Ok(purchase_ids)
    }

    // =========================================================================
    // Payment Plan Operations
    // =========================================================================

    /// Store a plan with its down payment and installment rows in one
    /// transaction.
    #[instrument(skip(self, purchase, input, schedule), fields(purchase_id = %purchase.purchase_id))]
    pub async fn create_payment_plan(
        &self,
        purchase: &Purchase,
        input: &CreatePaymentPlan,
        total: Decimal,
        schedule: &PlanSchedule,
    ) -> Result<PaymentPlanWithInstallments, AppError> {
        if self.get_payment_plan(purchase.purchase_id).await?.is_some() {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Purchase already has a payment plan"
            )));
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_payment_plan"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("start transaction", e))?;

        let plan = sqlx::query_as::<_, PaymentPlan>(&format!(
            r#"
            INSERT INTO payment_plans (plan_id, purchase_id, total_amount, down_payment, installment_count, frequency, start_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PLAN_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(purchase.purchase_id)
        .bind(total)
        .bind(schedule.down_payment.unwrap_or(Decimal::ZERO))
        .bind(input.installment_count)
        .bind(input.frequency.as_str())
        .bind(input.start_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("create payment plan", e))?;

        let method = input.method.as_str();
        let mut installments = Vec::with_capacity(schedule.installments.len() + 1);

        if let Some(down) = schedule.down_payment {
            let row = insert_plan_payment(
                &mut tx,
                &plan,
                &purchase.currency,
                method,
                PlanRow {
                    number: 0,
                    amount: down,
                    due_date: input.start_date,
                    status: PaymentStatus::Paid,
                },
            )
            .await?;
            installments.push(row);
        }

        for installment in &schedule.installments {
            let row = insert_plan_payment(
                &mut tx,
                &plan,
                &purchase.currency,
                method,
                PlanRow {
                    number: installment.number,
                    amount: installment.amount,
                    due_date: installment.due_date,
                    status: PaymentStatus::Pending,
                },
            )
            .await?;
            installments.push(row);
        }

        tx.commit()
            .await
            .map_err(|e| db_error("commit payment plan", e))?;

        timer.observe_duration();
        info!(
            plan_id = %plan.plan_id,
            purchase_id = %purchase.purchase_id,
            installments = schedule.installments.len(),
            "Payment plan created"
        );

        Ok(PaymentPlanWithInstallments { plan, installments })
    }

    #[instrument(skip(self))]
    pub async fn get_payment_plan(
        &self,
        purchase_id: Uuid,
    ) -> Result<Option<PaymentPlanWithInstallments>, AppError> {
        let plan = sqlx::query_as::<_, PaymentPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM payment_plans WHERE purchase_id = $1"
        ))
        .bind(purchase_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("get payment plan", e))?;

        let Some(plan) = plan else {
            return Ok(None);
        };

        let installments = sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM payments
            WHERE plan_id = $1
            ORDER BY installment_number
            "#
        ))
        .bind(plan.plan_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("get plan installments", e))?;

        Ok(Some(PaymentPlanWithInstallments { plan, installments }))
    }
}

struct PlanRow {
    number: i32,
    amount: Decimal,
    due_date: NaiveDate,
    status: PaymentStatus,
}

async fn query_paid_totals<'e, E>(executor: E, purchase_id: Uuid) -> Result<Vec<PaidTotal>, AppError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, PaidTotal>(
        r#"
        SELECT currency, SUM(amount) AS amount, MAX(paid_utc) AS last_paid_utc
        FROM payments
        WHERE purchase_id = $1 AND status = 'paid'
        GROUP BY currency
        ORDER BY currency
        "#,
    )
    .bind(purchase_id)
    .fetch_all(executor)
    .await
    .map_err(|e| db_error("sum paid payments", e))
}

async fn insert_plan_payment(
    tx: &mut Transaction<'_, Postgres>,
    plan: &PaymentPlan,
    currency: &str,
    method: &str,
    row: PlanRow,
) -> Result<Payment, AppError> {
    let paid_utc = (row.status == PaymentStatus::Paid).then(Utc::now);

    sqlx::query_as::<_, Payment>(&format!(
        r#"
        INSERT INTO payments (payment_id, purchase_id, plan_id, installment_number, amount, currency, method, status, due_date, paid_utc)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {PAYMENT_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(plan.purchase_id)
    .bind(plan.plan_id)
    .bind(row.number)
    .bind(row.amount)
    .bind(currency)
    .bind(method)
    .bind(row.status.as_str())
    .bind(row.due_date)
    .bind(paid_utc)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| db_error("create installment", e))
}

async fn restore_bundle_stock(
    tx: &mut Transaction<'_, Postgres>,
    bundle_id: Uuid,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE inventory_items i
        SET stock_quantity = i.stock_quantity + bi.quantity
        FROM bundle_items bi
        WHERE bi.bundle_id = $1 AND bi.item_id = i.item_id
        "#,
    )
    .bind(bundle_id)
    .execute(&mut **tx)
    .await
    .map_err(|e| db_error("restore bundle stock", e))?;
    Ok(())
}
