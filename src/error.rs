use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error occurred", self.to_string())
            }
            AppError::NotFound(_) => {
                tracing::warn!("Not found: {}", self);
                (StatusCode::NOT_FOUND, "Resource not found", self.to_string())
            }
            AppError::Validation(_) => {
                tracing::warn!("Validation error: {}", self);
                (StatusCode::BAD_REQUEST, "Validation failed", self.to_string())
            }
            AppError::Gateway(e) => {
                tracing::error!("Payment gateway error: {}", e);
                (StatusCode::BAD_GATEWAY, "Payment initiation failed. Try again.", self.to_string())
            }
            AppError::Unauthorized(_) => {
                tracing::warn!("Unauthorized: {}", self);
                (StatusCode::UNAUTHORIZED, "Authentication required", self.to_string())
            }
            AppError::Forbidden(_) => {
                tracing::warn!("Forbidden: {}", self);
                (StatusCode::FORBIDDEN, "Access denied", self.to_string())
            }
            AppError::Conflict(_) => {
                tracing::warn!("Conflict: {}", self);
                (StatusCode::CONFLICT, "Conflict", self.to_string())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", self.to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
            "details": details,
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        AppError::Database(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_error_kinds() {
        let cases = [
            (AppError::NotFound("Project".into()), StatusCode::NOT_FOUND),
            (AppError::Validation("too small".into()), StatusCode::BAD_REQUEST),
            (AppError::Gateway("timeout".into()), StatusCode::BAD_GATEWAY),
            (AppError::Unauthorized("no token".into()), StatusCode::UNAUTHORIZED),
            (AppError::Forbidden("not owner".into()), StatusCode::FORBIDDEN),
            (AppError::Conflict("email taken".into()), StatusCode::CONFLICT),
            (AppError::Database("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
