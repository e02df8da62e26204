use axum::http::{HeaderMap, header::AUTHORIZATION};
use schema::UserId;

use super::{ApiError, ReceiverRuntime};

pub(crate) fn authorization_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
}

/// Resolves the caller or fails with 401 before anything else is read.
pub(crate) fn authenticate_request(
    runtime: &ReceiverRuntime,
    headers: &HeaderMap,
    path: &'static str,
) -> Result<UserId, ApiError> {
    runtime
        .authenticate(authorization_header(headers))
        .inspect_err(|_| {
            tracing::warn!(
                op = "receiver.auth.rejected",
                path,
                has_authorization = headers.contains_key(AUTHORIZATION),
                "request did not present a valid bearer token"
            );
        })
}
