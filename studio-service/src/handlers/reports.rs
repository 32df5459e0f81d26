//! Dashboard, report and exchange rate actions.

use axum::extract::{Query, State};
use chrono::{Datelike, NaiveTime, Utc};
use service_core::action::{ok, ActionResult};

use super::tracked;
use crate::{
    models::{DashboardSummary, PaymentsReport, PaymentsReportQuery},
    services::ExchangeRate,
    AppState,
};

pub async fn dashboard(State(state): State<AppState>) -> ActionResult<DashboardSummary> {
    let today = Utc::now().date_naive();
    let month_start = today
        .with_day(1)
        .unwrap_or(today)
        .and_time(NaiveTime::MIN)
        .and_utc();
    let reporting = state.balances.reporting_currency().to_uppercase();

    let mut summary = tracked(
        "dashboard",
        state.db.dashboard_summary(month_start, &reporting).await,
    )?;

    for collected in &summary.collected_this_month {
        match state
            .rates
            .convert(collected.amount, &collected.currency, &reporting)
            .await
        {
            Ok(amount) => summary.collected_this_month_total += amount,
            Err(e) => tracing::warn!(
                currency = %collected.currency,
                error = %e,
                "Left collected amount out of the reporting total"
            ),
        }
    }

    ok(summary)
}

pub async fn payments_report(
    State(state): State<AppState>,
    Query(query): Query<PaymentsReportQuery>,
) -> ActionResult<PaymentsReport> {
    let report = tracked(
        "payments_report",
        state.db.payments_report(query.from, query.to).await,
    )?;
    ok(report)
}

pub async fn exchange_rate(State(state): State<AppState>) -> ActionResult<ExchangeRate> {
    ok(state.rates.current_rate().await)
}
