//! Application startup and lifecycle management.

use crate::config::StudioConfig;
use crate::handlers::{balances, catalog, clients, organizations, payments, purchases, reports};
use crate::services::{
    get_metrics, init_metrics, BalanceService, Database, ExchangeRateService, HttpSmsProvider,
    SmsProvider,
};
use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::security_headers::security_headers_middleware;
use service_core::middleware::tracing::{request_id_middleware, REQUEST_ID_HEADER};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: StudioConfig,
    pub db: Arc<Database>,
    pub balances: Arc<BalanceService>,
    pub rates: Arc<ExchangeRateService>,
    pub sms: Arc<dyn SmsProvider>,
}

/// Health check endpoint for Docker/K8s liveness probes.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(_) => {
            tracing::debug!("Health check passed");
            (
                StatusCode::OK,
                Json(json!({
                    "status": "ok",
                    "service": state.config.service_name,
                    "version": state.config.service_version
                })),
            )
        }
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed - database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": state.config.service_name,
                    "error": "database unavailable"
                })),
            )
        }
    }
}

/// Readiness check endpoint for K8s readiness probes.
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Metrics endpoint for Prometheus scraping.
async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}

fn api_routes() -> Router<AppState> {
    Router::new()
        // Organizations
        .route(
            "/organizations",
            post(organizations::create_organization).get(organizations::list_organizations),
        )
        .route(
            "/organizations/:organization_id",
            get(organizations::get_organization).put(organizations::update_organization),
        )
        .route(
            "/organizations/:organization_id/deactivate",
            post(organizations::deactivate_organization),
        )
        // Clients and children
        .route(
            "/clients",
            post(clients::create_client).get(clients::list_clients),
        )
        .route(
            "/clients/:client_id",
            get(clients::get_client)
                .put(clients::update_client)
                .delete(clients::delete_client),
        )
        .route("/clients/:client_id/balance", get(balances::client_balance))
        .route(
            "/clients/:client_id/reminders",
            post(balances::send_reminder),
        )
        .route("/debtors", get(balances::list_debtors))
        .route(
            "/children",
            post(clients::create_child).get(clients::list_children),
        )
        .route(
            "/children/:child_id",
            get(clients::get_child)
                .put(clients::update_child)
                .delete(clients::delete_child),
        )
        // Catalog
        .route(
            "/inventory",
            post(catalog::create_inventory_item).get(catalog::list_inventory_items),
        )
        .route(
            "/inventory/:item_id",
            get(catalog::get_inventory_item).put(catalog::update_inventory_item),
        )
        .route("/inventory/:item_id/stock", post(catalog::adjust_stock))
        .route(
            "/bundles",
            post(catalog::create_bundle).get(catalog::list_bundles),
        )
        .route(
            "/bundles/:bundle_id",
            get(catalog::get_bundle).put(catalog::update_bundle),
        )
        .route("/bundles/:bundle_id/items", put(catalog::set_bundle_items))
        .route(
            "/bundles/:bundle_id/deactivate",
            post(catalog::deactivate_bundle),
        )
        // Purchases, payments and plans
        .route(
            "/purchases",
            post(purchases::create_purchase).get(purchases::list_purchases),
        )
        .route("/purchases/:purchase_id", get(purchases::get_purchase))
        .route(
            "/purchases/:purchase_id/cancel",
            post(purchases::cancel_purchase),
        )
        .route(
            "/purchases/:purchase_id/balance",
            get(balances::purchase_balance),
        )
        .route(
            "/purchases/:purchase_id/payments",
            post(payments::record_payment).get(payments::list_payments),
        )
        .route(
            "/purchases/:purchase_id/plan",
            post(payments::create_payment_plan).get(payments::get_payment_plan),
        )
        .route(
            "/payments/:payment_id/mark-paid",
            post(payments::mark_payment_paid),
        )
        .route(
            "/payments/:payment_id/cancel",
            post(payments::cancel_payment),
        )
        .route("/payments/sweep-overdue", post(payments::sweep_overdue))
        // Reporting
        .route("/dashboard", get(reports::dashboard))
        .route("/reports/payments", get(reports::payments_report))
        .route("/exchange-rate", get(reports::exchange_rate))
}

/// Build the full router for the given state.
pub fn router(state: AppState) -> Router {
    let request_timeout = Duration::from_secs(state.config.common.request_timeout_secs);

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .nest("/api/v1", api_routes())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    http_listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: StudioConfig) -> Result<Self, AppError> {
        Self::build_internal(config, true).await
    }

    /// Build the application without running migrations.
    /// Use this in tests when migrations are already applied by the test harness.
    pub async fn build_without_migrations(config: StudioConfig) -> Result<Self, AppError> {
        Self::build_internal(config, false).await
    }

    async fn build_internal(config: StudioConfig, run_migrations: bool) -> Result<Self, AppError> {
        init_metrics();

        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        if run_migrations {
            db.run_migrations().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to run migrations");
                e
            })?;
        }

        let db = Arc::new(db);
        let rates = Arc::new(ExchangeRateService::new(config.exchange_rate.clone()));
        let balances = Arc::new(BalanceService::new(
            db.clone(),
            rates.clone(),
            config.balance.clone(),
        ));
        let sms: Arc<dyn SmsProvider> = Arc::new(HttpSmsProvider::new(config.sms.clone()));

        if !sms.is_enabled() {
            tracing::warn!("SMS provider disabled; reminders will be rejected");
        }

        let state = AppState {
            config: config.clone(),
            db,
            balances,
            rates,
            sms,
        };

        let http_addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let http_listener = TcpListener::bind(http_addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %http_addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let http_port = http_listener.local_addr()?.port();

        tracing::info!(http_port = http_port, "Studio service listener bound");

        Ok(Self {
            http_port,
            http_listener,
            state,
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    /// Get a reference to the database.
    pub fn db(&self) -> &Database {
        &self.state.db
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let app = router(self.state);

        tracing::info!(
            service = "studio-service",
            version = env!("CARGO_PKG_VERSION"),
            http_port = self.http_port,
            "Service ready to accept connections"
        );

        axum::serve(self.http_listener, app).await
    }
}
