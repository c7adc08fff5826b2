//! # Web API Error Types
//!
//! HTTP mapping for [`FleetError`] plus the request-shape failures the
//! extractors produce. Every error renders as
//! `{"error": {"code": ..., "message": ...}}`; server-side failures never
//! leak their internal text.

use crate::error::FleetError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Fleet(#[from] FleetError),

    #[error("Invalid request: {message}")]
    BadRequest { message: String },

    #[error("Invalid UUID format: {uuid}")]
    InvalidUuid { uuid: String },

    #[error("Service temporarily unavailable")]
    ServiceUnavailable,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn invalid_uuid(uuid: impl Into<String>) -> Self {
        Self::InvalidUuid { uuid: uuid.into() }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Fleet(err) => fleet_status(err),
            Self::BadRequest { .. } | Self::InvalidUuid { .. } => StatusCode::BAD_REQUEST,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Fleet(err) => err.error_code(),
            Self::BadRequest { .. } => "BAD_REQUEST",
            Self::InvalidUuid { .. } => "INVALID_UUID",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        }
    }
}

fn fleet_status(err: &FleetError) -> StatusCode {
    match err {
        FleetError::Validation(_) | FleetError::InvalidQuantity(_) => StatusCode::BAD_REQUEST,
        FleetError::NotFound { .. } => StatusCode::NOT_FOUND,
        FleetError::Conflict(_)
        | FleetError::DuplicateRecurringTask { .. }
        | FleetError::InactiveTemplate(_)
        | FleetError::InvalidTransition { .. } => StatusCode::CONFLICT,
        FleetError::InsufficientStock { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        FleetError::Timeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
        FleetError::Transaction(_) | FleetError::Migration(_) | FleetError::Configuration(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        let message = if status_code.is_server_error() {
            error!(error = %self, code = self.error_code(), "Request failed");
            match status_code {
                StatusCode::SERVICE_UNAVAILABLE => "Service temporarily unavailable".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            match &self {
                Self::Fleet(err) => err.to_string(),
                other => other.to_string(),
            }
        };

        let error_response = json!({
            "error": {
                "code": self.error_code(),
                "message": message
            }
        });

        (status_code, Json(error_response)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::Fleet(FleetError::from(err))
    }
}

impl From<uuid::Error> for ApiError {
    fn from(err: uuid::Error) -> Self {
        Self::invalid_uuid(err.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_client_errors_map_to_4xx() {
        let cases = [
            (FleetError::validation("bad"), StatusCode::BAD_REQUEST),
            (FleetError::not_found("task", Uuid::nil()), StatusCode::NOT_FOUND),
            (FleetError::Conflict("in use".into()), StatusCode::CONFLICT),
            (FleetError::InactiveTemplate(Uuid::nil()), StatusCode::CONFLICT),
            (
                FleetError::InsufficientStock {
                    entity: "inventory item",
                    id: Uuid::nil(),
                    available: 1,
                    requested: 2,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }

    #[test]
    fn test_server_errors_hide_details() {
        let response = ApiError::from(sqlx::Error::PoolClosed).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
