//! Prometheus metrics for studio-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter_vec, CounterVec, Encoder,
    HistogramVec, IntCounterVec, TextEncoder,
};

/// Database query duration by operation.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "studio_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Action outcomes by action name and result.
pub static ACTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "studio_actions_total",
        "Total actions by name and outcome",
        &["action", "outcome"]
    )
    .expect("Failed to register ACTIONS_TOTAL")
});

/// Money marked as received, by currency and method.
pub static PAYMENTS_RECEIVED_AMOUNT: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "studio_payments_received_amount_total",
        "Sum of payment amounts marked paid",
        &["currency", "method"]
    )
    .expect("Failed to register PAYMENTS_RECEIVED_AMOUNT")
});

/// Debtor flag writes that actually changed a client.
pub static DEBTOR_FLAG_CHANGES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "studio_debtor_flag_changes_total",
        "Debtor flag transitions",
        &["to"]
    )
    .expect("Failed to register DEBTOR_FLAG_CHANGES")
});

/// Exchange rate lookups by where the answer came from.
pub static EXCHANGE_RATE_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "studio_exchange_rate_lookups_total",
        "Exchange rate lookups by source",
        &["source"]
    )
    .expect("Failed to register EXCHANGE_RATE_LOOKUPS")
});

/// SMS sends by outcome.
pub static SMS_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "studio_sms_sent_total",
        "SMS notifications by outcome",
        &["outcome"]
    )
    .expect("Failed to register SMS_SENT")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&ACTIONS_TOTAL);
    Lazy::force(&PAYMENTS_RECEIVED_AMOUNT);
    Lazy::force(&DEBTOR_FLAG_CHANGES);
    Lazy::force(&EXCHANGE_RATE_LOOKUPS);
    Lazy::force(&SMS_SENT);
}

pub fn record_action(action: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    ACTIONS_TOTAL.with_label_values(&[action, outcome]).inc();
}

pub fn record_payment_received(currency: &str, method: &str, amount: f64) {
    PAYMENTS_RECEIVED_AMOUNT
        .with_label_values(&[currency, method])
        .inc_by(amount);
}

pub fn record_debtor_flag_change(is_debtor: bool) {
    let to = if is_debtor { "debtor" } else { "cleared" };
    DEBTOR_FLAG_CHANGES.with_label_values(&[to]).inc();
}

pub fn record_exchange_rate_lookup(source: &str) {
    EXCHANGE_RATE_LOOKUPS.with_label_values(&[source]).inc();
}

pub fn record_sms(success: bool) {
    let outcome = if success { "sent" } else { "failed" };
    SMS_SENT.with_label_values(&[outcome]).inc();
}

/// Render the default registry in the Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
