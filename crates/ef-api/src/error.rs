//! Maps `ef-core` errors onto HTTP responses.
//!
//! Validation failures keep the full per-field error list in the body so
//! a client can highlight every offending field in one round-trip.

use std::fmt;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use ef_core::error::AppError;
use serde_json::json;

/// Newtype so we can implement `ResponseError` for the domain error.
pub struct ApiError(pub AppError);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl fmt::Debug for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl From<anyhow::Error> for ApiError {
    /// Port methods return `anyhow::Error`; domain failures tunneled
    /// through them are recovered here, everything else is a 500.
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<AppError>() {
            Ok(app) => ApiError(app),
            Err(other) => {
                log::error!("internal error: {other:#}");
                ApiError(AppError::Internal(other.to_string()))
            }
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            AppError::NotFound(..) => StatusCode::NOT_FOUND,
            AppError::ValidationError(_)
            | AppError::UnknownFieldType(_)
            | AppError::InvalidFieldConfiguration(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_)
            | AppError::FormClosed
            | AppError::OwnershipViolation { .. } => StatusCode::FORBIDDEN,
            AppError::LoginRequired => StatusCode::UNAUTHORIZED,
            AppError::SubmissionRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Integrity errors are server faults; make sure they hit the log.
        if matches!(
            &self.0,
            AppError::UnknownFieldType(_)
                | AppError::InvalidFieldConfiguration(_)
                | AppError::OwnershipViolation { .. }
        ) {
            log::error!("integrity error: {}", self.0);
        }
        match &self.0 {
            AppError::SubmissionRejected(errors) => HttpResponse::build(self.status_code()).json(
                json!({ "status": "rejected", "errors": errors }),
            ),
            other => HttpResponse::build(self.status_code())
                .json(json!({ "message": other.to_string() })),
        }
    }
}
