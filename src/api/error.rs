use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::gate::GateError;
use crate::persistence;
use crate::reachability::ValidationError;

use super::models::ErrorResponse;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid batch: {0}")]
    InvalidBatch(#[from] ValidationError),
    #[error(transparent)]
    Rejected(#[from] GateError),
    #[error(transparent)]
    Storage(#[from] persistence::Error),
    #[error("request not handled within {0:?}")]
    Timeout(Duration),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidBatch(_) => StatusCode::BAD_REQUEST,
            Self::Rejected(GateError::Unauthorized) => StatusCode::UNAUTHORIZED,
            Self::Rejected(GateError::TooManyRequests) => StatusCode::TOO_MANY_REQUESTS,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
        }
    }

    /// Message sent to the client; details stay in the log.
    fn public_message(&self) -> &'static str {
        match self {
            Self::InvalidBatch(_) | Self::Rejected(GateError::Unauthorized) => "invalid request",
            Self::Rejected(GateError::TooManyRequests) => "server is busy",
            Self::Storage(_) => "internal error",
            Self::Timeout(_) => "request timed out",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error_message: self.public_message().to_owned(),
        };
        (self.status(), Json(body)).into_response()
    }
}
