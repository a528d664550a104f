//! Error types for the REST API server

use crate::error::RatingError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// API error types
#[derive(Debug)]
pub enum ApiError {
    /// Malformed date, non-positive day count or unknown rating
    InvalidParameter(String),
    /// The requested end date precedes the dataset
    NoEarlierDate(String),
    /// The window reaches before the dataset
    InsufficientHistory(String),
    /// Unknown instrument
    NotFound(String),
    /// A dataset could not be loaded
    DataUnavailable(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, &str) {
        let (status, kind, msg) = match self {
            ApiError::InvalidParameter(msg) => (StatusCode::BAD_REQUEST, "InvalidParameter", msg),
            ApiError::NoEarlierDate(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "NoEarlierDate", msg),
            ApiError::InsufficientHistory(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "InsufficientHistory", msg)
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NotFound", msg),
            ApiError::DataUnavailable(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "DataProvider", msg)
            }
        };
        (status, kind, msg.as_str())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (_, kind, message) = self.parts();
        write!(f, "{}: {}", kind, message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(error = %message, "request failed");
        }

        let body = Json(json!({
            "error": error_type,
            "message": message,
        }));

        (status, body).into_response()
    }
}

impl From<RatingError> for ApiError {
    fn from(err: RatingError) -> Self {
        let message = err.to_string();
        match err {
            RatingError::InvalidParameter(_) => ApiError::InvalidParameter(message),
            RatingError::NoEarlierDate { .. } => ApiError::NoEarlierDate(message),
            RatingError::InsufficientHistory { .. } => ApiError::InsufficientHistory(message),
            RatingError::NotFound(_) => ApiError::NotFound(message),
            RatingError::DataProvider(_) => ApiError::DataUnavailable(message),
        }
    }
}

impl From<crate::observation::DataProviderError> for ApiError {
    fn from(err: crate::observation::DataProviderError) -> Self {
        RatingError::from(err).into()
    }
}
