//! The response envelope every action returns.
//!
//! Callers never have to inspect HTTP status codes to tell success from
//! failure: the body is always `{"success": true, "data": ...}` or
//! `{"success": false, "error": "..."}`. Failures are produced by
//! [`AppError`](crate::error::AppError)'s `IntoResponse` impl.

use axum::{Json, http::StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ActionResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Result type for handlers answering `200 OK`.
pub type ActionResult<T> = Result<Json<ActionResponse<T>>, AppError>;

/// Result type for handlers answering `201 Created`.
pub type CreatedResult<T> = Result<(StatusCode, Json<ActionResponse<T>>), AppError>;

pub fn ok<T>(data: T) -> ActionResult<T> {
    Ok(Json(ActionResponse::ok(data)))
}

pub fn created<T>(data: T) -> CreatedResult<T> {
    Ok((StatusCode::CREATED, Json(ActionResponse::ok(data))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_envelope_omits_error() {
        let body = serde_json::to_value(ActionResponse::ok(42)).unwrap();
        assert_eq!(body, serde_json::json!({ "success": true, "data": 42 }));
    }

    #[test]
    fn failure_envelope_omits_data() {
        let body = serde_json::to_value(ActionResponse::<()>::failure("nope")).unwrap();
        assert_eq!(body, serde_json::json!({ "success": false, "error": "nope" }));
    }
}
