use std::any::Any;

use axum::http::{Method, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::utils::error::AppError;

pub mod events;

pub use events::{create_event, delete_event, get_event, list_events, update_event};

#[derive(Serialize)]
struct HealthPayload {
    success: bool,
    message: &'static str,
    timestamp: DateTime<Utc>,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        success: true,
        message: "Server is running",
        timestamp: Utc::now(),
    };

    Json(payload).into_response()
}

/// Fallback for every unmatched method and path.
pub async fn not_found(method: Method, uri: Uri) -> AppError {
    AppError::RouteNotFound {
        method: method.to_string(),
        path: uri.path().to_string(),
    }
}

/// Turns a handler panic into the standard 500 envelope.
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    };

    AppError::InternalServerError(detail).into_response()
}
