use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use super::DecodeError;

/// Per-request failures. Every variant maps to a status code with an empty
/// body; none of them affect other requests or the stored messages.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing or invalid bearer token")]
    Unauthorized,
    #[error("malformed submission: {0}")]
    BadRequest(#[from] DecodeError),
    #[error("failed to read request body: {0}")]
    BodyRead(String),
    #[error("failed to acquire message store lock")]
    LockPoisoned,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::BodyRead(_) | Self::LockPoisoned => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.status().into_response()
    }
}
