//! Handler-level error type.
//!
//! JSON endpoints return `AppResult<T>`; the error renders as
//! `{ "success": false, "message": ..., "status": ... }`. Page handlers do not
//! use this type for infrastructure failures, they redirect to the
//! unexpected-error page instead (see `http::unexpected_error`).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound      => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_)   => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound,
            other => AppError::Internal(anyhow::anyhow!(other)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Never leak internal causes to the client.
        let message = match &self {
            AppError::Internal(e) => {
                tracing::error!(error = ?e, "Internal server error");
                "An unexpected error occurred".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(json!({
                "success": false,
                "message": message,
                "status":  status.as_u16(),
            })),
        )
            .into_response()
    }
}
