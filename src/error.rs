use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::backend::{BackendError, GENERIC_FAILURE};
use crate::booking::BookingError;

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    /// The studio backend refused the request; its message is passed on as is.
    Upstream(StatusCode, String),
    BadGateway(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg).into_response(),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg).into_response(),
            ApiError::Upstream(status, msg) => (status, msg).into_response(),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg).into_response(),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg).into_response(),
        }
    }
}

impl From<BackendError> for ApiError {
    fn from(value: BackendError) -> Self {
        match value {
            BackendError::MissingToken => ApiError::Unauthorized(value.to_string()),
            BackendError::Rejected { status, message } if status.is_client_error() => {
                ApiError::Upstream(status, message)
            }
            BackendError::Rejected { status, message } => {
                error!(%status, "backend failure: {message}");
                ApiError::BadGateway(message)
            }
            BackendError::Http(err) => {
                error!("HTTP error: {err}");
                ApiError::BadGateway(GENERIC_FAILURE.into())
            }
            BackendError::Url(err) => {
                error!("URL error: {err}");
                ApiError::Internal(GENERIC_FAILURE.into())
            }
        }
    }
}

impl From<BookingError> for ApiError {
    fn from(value: BookingError) -> Self {
        match value {
            BookingError::UnknownClass(_) => ApiError::NotFound(value.to_string()),
            BookingError::AlreadyBooked
            | BookingError::NotBooked
            | BookingError::ClassFull
            | BookingError::NotEligible(_)
            | BookingError::InProgress => ApiError::Conflict(value.to_string()),
            BookingError::Backend(err) => err.into(),
        }
    }
}
