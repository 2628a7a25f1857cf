use axum::{http::StatusCode, response::IntoResponse, Json};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Scrape error: {0}")]
    Scrape(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid stored record: {0}")]
    InvalidRecord(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Scrape queue unavailable: {0}")]
    QueueFull(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::QueueFull(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Http(_) | AppError::Scrape(_) => StatusCode::BAD_GATEWAY,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "request failed: {self}");
        }
        (status, Json(serde_json::json!({ "detail": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_errors_map_to_distinct_statuses() {
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Scrape("x".into()).status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            AppError::Database(sqlx::Error::PoolTimedOut).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::InvalidRecord("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
