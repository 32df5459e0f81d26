//! Dashboard and reporting queries.

use super::{db_error, Database};
use crate::models::{CurrencyAmount, DashboardSummary, PaymentReportRow, PaymentsReport, StatusCount};
use crate::services::metrics::DB_QUERY_DURATION;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::collections::BTreeMap;
use tracing::instrument;

impl Database {
    /// Headline counts and money sums. `collected_this_month_total` is left
    /// at zero for the caller to fill in the reporting currency.
    #[instrument(skip(self))]
    pub async fn dashboard_summary(
        &self,
        month_start: DateTime<Utc>,
        reporting_currency: &str,
    ) -> Result<DashboardSummary, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["dashboard_summary"])
            .start_timer();

        let (organizations, clients, debtors, overdue_payments): (i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM organizations WHERE is_active),
                    (SELECT COUNT(*) FROM clients),
                    (SELECT COUNT(*) FROM clients WHERE is_debtor),
                    (SELECT COUNT(*) FROM payments WHERE status = 'overdue')
                "#,
            )
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("count dashboard totals", e))?;

        let purchases_by_status = sqlx::query_as::<_, StatusCount>(
            r#"
            SELECT status, COUNT(*) AS count
            FROM purchases
            GROUP BY status
            ORDER BY status
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("count purchases by status", e))?;

        let collected_this_month = sqlx::query_as::<_, CurrencyAmount>(
            r#"
            SELECT currency, SUM(amount) AS amount
            FROM payments
            WHERE status = 'paid' AND paid_utc >= $1
            GROUP BY currency
            ORDER BY currency
            "#,
        )
        .bind(month_start)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("sum collected payments", e))?;

        let scheduled_outstanding = sqlx::query_as::<_, CurrencyAmount>(
            r#"
            SELECT currency, SUM(amount) AS amount
            FROM payments
            WHERE status IN ('pending', 'overdue')
            GROUP BY currency
            ORDER BY currency
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("sum scheduled payments", e))?;

        timer.observe_duration();

        Ok(DashboardSummary {
            organizations,
            clients,
            debtors,
            purchases_by_status,
            overdue_payments,
            collected_this_month,
            scheduled_outstanding,
            reporting_currency: reporting_currency.to_string(),
            collected_this_month_total: Decimal::ZERO,
        })
    }

    /// Paid payments between two dates (inclusive, UTC), grouped by method
    /// and currency.
    #[instrument(skip(self))]
    pub async fn payments_report(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<PaymentsReport, AppError> {
        if from > to {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Report start {} is after its end {}",
                from,
                to
            )));
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["payments_report"])
            .start_timer();

        let rows = sqlx::query_as::<_, PaymentReportRow>(
            r#"
            SELECT method, currency, COUNT(*) AS payment_count, SUM(amount) AS total
            FROM payments
            WHERE status = 'paid'
              AND (paid_utc AT TIME ZONE 'UTC')::date BETWEEN $1 AND $2
            GROUP BY method, currency
            ORDER BY method, currency
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("build payments report", e))?;

        timer.observe_duration();

        let totals = totals_by_currency(&rows);
        Ok(PaymentsReport {
            from,
            to,
            rows,
            totals,
        })
    }
}

fn totals_by_currency(rows: &[PaymentReportRow]) -> Vec<CurrencyAmount> {
    let mut totals: BTreeMap<&str, Decimal> = BTreeMap::new();
    for row in rows {
        *totals.entry(row.currency.as_str()).or_default() += row.total;
    }
    totals
        .into_iter()
        .map(|(currency, amount)| CurrencyAmount {
            currency: currency.to_string(),
            amount,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(method: &str, currency: &str, total: i64) -> PaymentReportRow {
        PaymentReportRow {
            method: method.to_string(),
            currency: currency.to_string(),
            payment_count: 1,
            total: Decimal::new(total, 0),
        }
    }

    #[test]
    fn totals_are_summed_per_currency_across_methods() {
        let rows = vec![
            row("card", "USD", 40),
            row("cash", "CRC", 5000),
            row("cash", "USD", 60),
        ];

        let totals = totals_by_currency(&rows);

        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].currency, "CRC");
        assert_eq!(totals[0].amount, Decimal::new(5000, 0));
        assert_eq!(totals[1].currency, "USD");
        assert_eq!(totals[1].amount, Decimal::new(100, 0));
    }
}
