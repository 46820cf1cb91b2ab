use axum::{Json, http::StatusCode, response::IntoResponse};
use thiserror::Error;

use super::models::ErrorResponse;
use crate::delivery::DeliveryError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Forbidden(String),
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
    #[error("upstream conversion failed: {0}")]
    BadGateway(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Internal(_) => "INTERNAL_ERROR",
            ApiError::BadGateway(_) => "UPSTREAM_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<DeliveryError> for ApiError {
    fn from(value: DeliveryError) -> Self {
        match value {
            DeliveryError::InvalidToken | DeliveryError::ProfileTokenNotSet => {
                ApiError::Forbidden(value.to_string())
            }
            DeliveryError::ProfileNotFound(id) => ApiError::NotFound(format!("profile {id}")),
            DeliveryError::ConverterNotConfigured | DeliveryError::Store(_) => {
                ApiError::Internal(value.to_string())
            }
            DeliveryError::Upstream(e) => ApiError::BadGateway(e.to_string()),
        }
    }
}
