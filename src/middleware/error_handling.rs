use crate::error::AppError;
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// Map a domain error to its HTTP status and caller-visible message.
/// Server-side failures get a generic message; detail stays in the logs.
pub fn map_error(err: &AppError) -> (StatusCode, String) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let message = match err {
        AppError::Validation(msg) => msg.clone(),
        AppError::Unauthorized => "unauthorized".to_string(),
        AppError::Forbidden => "forbidden".to_string(),
        AppError::NotFound => "not found".to_string(),
        AppError::Config(_) | AppError::StartServer(_) | AppError::Database(_) | AppError::Internal => {
            "internal server error".to_string()
        }
    };
    (status, message)
}

pub fn into_response(err: AppError) -> impl IntoResponse {
    let (status, message) = map_error(&err);
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }
    // Uniform error body: {"error": "..."}
    (status, Json(json!({ "error": message })))
}
