//! HTTP actions. Every handler answers with the `ActionResponse` envelope.

pub mod balances;
pub mod catalog;
pub mod clients;
pub mod organizations;
pub mod payments;
pub mod purchases;
pub mod reports;

use crate::services::metrics::record_action;
use service_core::error::AppError;

/// Count the outcome of an action before handing the result back.
pub(crate) fn tracked<T>(action: &str, result: Result<T, AppError>) -> Result<T, AppError> {
    record_action(action, result.is_ok());
    result
}

pub(crate) fn not_found(what: &str) -> AppError {
    AppError::NotFound(anyhow::anyhow!("{} not found", what))
}
