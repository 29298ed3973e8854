use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::RunMode;
use crate::models::InvalidTimestamp;
use crate::utils::response::error as error_response;

const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred";
const CONFLICT_MESSAGE: &str = "The resource already exists or conflicts with existing data";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    ValidationError(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Route {method} {path} does not exist")]
    RouteNotFound { method: String, path: String },

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("{0}")]
    InternalServerError(String),
}

/// Coarse class of a storage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbFaultKind {
    Conflict,
    Validation,
    Other,
}

/// Classifies a storage error by SQLSTATE class, falling back to the message.
pub fn classify_db_error(err: &sqlx::Error) -> DbFaultKind {
    let sqlx::Error::Database(db_err) = err else {
        return DbFaultKind::Other;
    };

    let code = db_err.code();
    let class = code.as_deref().and_then(|c| c.get(..2));
    match class {
        Some("23") => DbFaultKind::Conflict,
        Some("22") => DbFaultKind::Validation,
        _ if db_err.message().contains("duplicate key") => DbFaultKind::Conflict,
        _ => DbFaultKind::Other,
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) | AppError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            AppError::DatabaseError(e) => match classify_db_error(e) {
                DbFaultKind::Conflict => StatusCode::CONFLICT,
                DbFaultKind::Validation => StatusCode::BAD_REQUEST,
                DbFaultKind::Other => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The `error` and `message` members of the response envelope.
    pub fn public_parts(&self, mode: RunMode) -> (String, Option<String>) {
        match self {
            AppError::ValidationError(msg) | AppError::NotFound(msg) => (msg.clone(), None),
            AppError::RouteNotFound { .. } => ("Route not found".to_string(), Some(self.to_string())),
            AppError::DatabaseError(e) => match classify_db_error(e) {
                DbFaultKind::Conflict => (
                    "Database error".to_string(),
                    Some(CONFLICT_MESSAGE.to_string()),
                ),
                DbFaultKind::Validation => {
                    ("Validation error".to_string(), Some(database_message(e)))
                }
                DbFaultKind::Other => internal_parts(database_message(e), mode),
            },
            AppError::InternalServerError(msg) => internal_parts(msg.clone(), mode),
        }
    }

    fn log(&self) {
        let status = self.status_code();
        match self {
            AppError::NotFound(_) | AppError::RouteNotFound { .. } => {
                debug!(error = %self, "Not found");
            }
            AppError::DatabaseError(e) if status.is_server_error() => {
                error!(error = ?e, "Database error");
            }
            _ if status.is_server_error() => {
                error!(error = ?self, "Application error");
            }
            _ => {
                warn!(status = status.as_u16(), error = %self, "Request rejected");
            }
        }
    }
}

fn database_message(err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::Database(db_err) => db_err.message().to_string(),
        other => other.to_string(),
    }
}

fn internal_parts(detail: String, mode: RunMode) -> (String, Option<String>) {
    let message = if mode.is_development() {
        detail
    } else {
        GENERIC_ERROR_MESSAGE.to_string()
    };
    ("Internal server error".to_string(), Some(message))
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        self.log();

        let (error, message) = self.public_parts(RunMode::current());
        error_response(status, error, message)
    }
}

impl From<InvalidTimestamp> for AppError {
    fn from(err: InvalidTimestamp) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationError(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::ValidationError(format!("Invalid query string: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        debug!(rejection = %rejection.body_text(), "Unreadable path parameter");
        AppError::ValidationError("Invalid ID".to_string())
    }
}
