use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no call session for '{0}'")]
    NotFound(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt stored value: {0}")]
    Corrupt(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("prompt catalog error: {0}")]
    Catalog(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("malformed webhook payload: {0}")]
    Payload(#[from] serde_urlencoded::de::Error),
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Store(StoreError::Database(e))
    }
}

pub fn handle_error(e: &impl std::error::Error) {
    error!(error=%e, "request failed")
}

/// JSON error body for the admin endpoints.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Payload(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            handle_error(&self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
