use axum::{
    Json,
    body::{Body, to_bytes},
    extract::State,
    http::{HeaderMap, StatusCode, header::CONTENT_ENCODING},
};
use schema::{Record, UserId};
use store::StoreKind;

use super::{
    ApiError, CLEAR_MESSAGES_PATH, COLLECTIONS_BATCH_PATH, COMPONENTS_PATH, MAX_HTTP_BODY_BYTES,
    RECEIVED_BATCH_MESSAGES_PATH, RECEIVED_MESSAGES_PATH, SharedRuntime,
    authz::authenticate_request,
};
use crate::api::UpResponse;

pub(crate) async fn post_components(
    State(runtime): State<SharedRuntime>,
    headers: HeaderMap,
    body: Body,
) -> Result<StatusCode, ApiError> {
    submit(&runtime, StoreKind::Messages, COMPONENTS_PATH, &headers, body).await
}

pub(crate) async fn post_collections_batch(
    State(runtime): State<SharedRuntime>,
    headers: HeaderMap,
    body: Body,
) -> Result<StatusCode, ApiError> {
    submit(
        &runtime,
        StoreKind::BatchMessages,
        COLLECTIONS_BATCH_PATH,
        &headers,
        body,
    )
    .await
}

pub(crate) async fn get_received_messages(
    State(runtime): State<SharedRuntime>,
    headers: HeaderMap,
) -> Result<Json<Vec<Record>>, ApiError> {
    received(&runtime, StoreKind::Messages, RECEIVED_MESSAGES_PATH, &headers)
}

pub(crate) async fn get_received_batch_messages(
    State(runtime): State<SharedRuntime>,
    headers: HeaderMap,
) -> Result<Json<Vec<Record>>, ApiError> {
    received(
        &runtime,
        StoreKind::BatchMessages,
        RECEIVED_BATCH_MESSAGES_PATH,
        &headers,
    )
}

pub(crate) async fn post_clear_messages(
    State(runtime): State<SharedRuntime>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let user_id = authenticate_request(&runtime, &headers, CLEAR_MESSAGES_PATH)?;
    runtime.clear(&user_id)?;
    tracing::info!(op = "receiver.clear", user = %user_id, "cleared received messages");
    Ok(StatusCode::OK)
}

pub(crate) async fn get_up(State(runtime): State<SharedRuntime>) -> Json<UpResponse> {
    Json(runtime.up().clone())
}

async fn submit(
    runtime: &SharedRuntime,
    kind: StoreKind,
    path: &'static str,
    headers: &HeaderMap,
    body: Body,
) -> Result<StatusCode, ApiError> {
    let user_id = authenticate_request(runtime, headers, path)?;
    let body = read_body(body, &user_id).await?;
    let content_encoding = headers
        .get(CONTENT_ENCODING)
        .and_then(|value| value.to_str().ok());

    let stats = runtime
        .submit(kind, &user_id, &body, content_encoding)
        .inspect_err(|err| {
            tracing::warn!(
                op = "receiver.submit.rejected",
                user = %user_id,
                store = kind.as_str(),
                error = %err,
                "failed to parse messages"
            );
        })?;
    tracing::debug!(
        op = "receiver.submit",
        user = %user_id,
        store = kind.as_str(),
        retained = stats.retained,
        dropped = stats.dropped,
        "stored messages"
    );
    Ok(StatusCode::CREATED)
}

async fn read_body(body: Body, user_id: &UserId) -> Result<Vec<u8>, ApiError> {
    match to_bytes(body, MAX_HTTP_BODY_BYTES).await {
        Ok(bytes) => Ok(bytes.to_vec()),
        Err(err) => {
            tracing::error!(
                op = "receiver.body.read_failed",
                user = %user_id,
                error = %err,
                "error reading request body"
            );
            Err(ApiError::BodyRead(err.to_string()))
        }
    }
}

fn received(
    runtime: &SharedRuntime,
    kind: StoreKind,
    path: &'static str,
    headers: &HeaderMap,
) -> Result<Json<Vec<Record>>, ApiError> {
    let user_id = authenticate_request(runtime, headers, path)?;
    let records = runtime.received(kind, &user_id)?;
    Ok(Json(records))
}
