//! candi-tab/crates/ct-api/src/error.rs
//!
//! Maps core and rendering failures to JSON error responses.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use ct_core::error::AppError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    App(#[from] AppError),

    #[error("template rendering failed: {0}")]
    Render(#[from] askama::Error),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::App(AppError::NotFound(..)) => StatusCode::NOT_FOUND,
            ApiError::App(AppError::ValidationError(_) | AppError::Conflict(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::App(_) | ApiError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        HttpResponse::build(status).json(json!({ "error": self.to_string() }))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
