use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use courier_messenger::MessengerError;
use courier_utils::utils::log_internal_error;

pub const NOT_AUTHORIZED: &str = "You are not authorized!";

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
}

/// Error half of every HTTP chat route.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError { status, message: message.into() }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, NOT_AUTHORIZED)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<MessengerError> for ApiError {
    fn from(error: MessengerError) -> Self {
        if error.is_transient() {
            log_internal_error(&error);
        }
        match error {
            MessengerError::Unauthenticated(reason) => Self::new(StatusCode::UNAUTHORIZED, reason),
            MessengerError::InvalidArgument(reason) => Self::bad_request(reason),
            MessengerError::NotFound(what) => Self::new(StatusCode::NOT_FOUND, what),
            MessengerError::Timeout { .. } => Self::new(StatusCode::SERVICE_UNAVAILABLE, "Service temporarily unavailable"),
            MessengerError::Store(_) => Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { success: false, message: self.message })).into_response()
    }
}
