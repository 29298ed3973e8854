use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// The envelope every endpoint answers with. Absent members are omitted.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub fn ok<T>(data: T) -> Response
where
    T: Serialize,
{
    respond(StatusCode::OK, Some(data), None)
}

pub fn success<T>(data: T, message: impl Into<String>) -> Response
where
    T: Serialize,
{
    respond(StatusCode::OK, Some(data), Some(message.into()))
}

pub fn created<T>(data: T, message: impl Into<String>) -> Response
where
    T: Serialize,
{
    respond(StatusCode::CREATED, Some(data), Some(message.into()))
}

pub fn empty_success(message: impl Into<String>) -> Response {
    respond::<()>(StatusCode::OK, None, Some(message.into()))
}

pub fn error(status: StatusCode, error: impl Into<String>, message: Option<String>) -> Response {
    let body: ApiResponse<()> = ApiResponse {
        success: false,
        data: None,
        error: Some(error.into()),
        message,
    };

    (status, Json(body)).into_response()
}

fn respond<T>(status: StatusCode, data: Option<T>, message: Option<String>) -> Response
where
    T: Serialize,
{
    let body = ApiResponse {
        success: true,
        data,
        error: None,
        message,
    };
    (status, Json(body)).into_response()
}
