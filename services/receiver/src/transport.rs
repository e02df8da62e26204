use std::{
    num::NonZeroUsize,
    sync::{Arc, RwLock},
};

use auth::TokenTable;
use schema::{Record, UserId};
use store::{AppendStats, ReceivedMessages, StoreKind};
use thiserror::Error;

use crate::api::UpResponse;

pub(crate) mod archive;
pub(crate) mod authz;
pub mod config;
pub(crate) mod http;
pub(crate) mod payload;
pub(crate) mod routes;

pub use archive::decode_metadata_archive;
pub use config::{ConfigError, ReceiverConfig};
pub use http::ApiError;
pub use payload::decode_json_stream;

pub const COMPONENTS_PATH: &str = "/components";
pub const COLLECTIONS_BATCH_PATH: &str = "/collections/batch";
pub const RECEIVED_MESSAGES_PATH: &str = "/received_messages";
pub const RECEIVED_BATCH_MESSAGES_PATH: &str = "/received_batch_messages";
pub const CLEAR_MESSAGES_PATH: &str = "/clear_messages";
pub const UP_PATH: &str = "/up";

pub(crate) const MAX_HTTP_BODY_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON object stream: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read gzip contents: {0}")]
    Gzip(#[source] std::io::Error),
    #[error("failed to read tar archive: {0}")]
    Tar(#[source] std::io::Error),
    #[error("failed to read file contents {path}: {source}")]
    EntryMetadata {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read file contents {path}: entry is empty")]
    EmptyEntryMetadata { path: String },
}

/// Turns a submission body into records with the decoder bound to `kind`.
pub fn decode_submission(
    kind: StoreKind,
    body: &[u8],
    content_encoding: Option<&str>,
) -> Result<Vec<Record>, DecodeError> {
    match kind {
        StoreKind::Messages => decode_json_stream(body),
        StoreKind::BatchMessages => decode_metadata_archive(body, content_encoding),
    }
}

/// Process-lifetime state shared by every request handler.
///
/// The token table and status metadata are fixed at startup; only the
/// received messages sit behind the lock.
pub struct ReceiverRuntime {
    tokens: TokenTable,
    up: UpResponse,
    received: RwLock<ReceivedMessages>,
}

pub type SharedRuntime = Arc<ReceiverRuntime>;

impl ReceiverRuntime {
    pub fn new(tokens: TokenTable, message_limit: NonZeroUsize, up: UpResponse) -> Self {
        Self {
            tokens,
            up,
            received: RwLock::new(ReceivedMessages::new(message_limit)),
        }
    }

    pub fn from_config(config: &ReceiverConfig) -> Self {
        Self::new(
            config.tokens.clone(),
            config.message_limit,
            UpResponse::from_platform_descriptor(config.platform_descriptor.as_deref()),
        )
    }

    pub fn up(&self) -> &UpResponse {
        &self.up
    }

    pub fn authenticate(&self, authorization: Option<&str>) -> Result<UserId, ApiError> {
        self.tokens
            .authenticate(authorization)
            .ok_or(ApiError::Unauthorized)
    }

    /// Decodes `body` and appends the records for `user_id`.
    ///
    /// Decoding happens before the lock is taken, so a malformed body never
    /// touches the store.
    pub fn submit(
        &self,
        kind: StoreKind,
        user_id: &UserId,
        body: &[u8],
        content_encoding: Option<&str>,
    ) -> Result<AppendStats, ApiError> {
        let records = decode_submission(kind, body, content_encoding)?;
        self.append(kind, user_id, records)
    }

    pub fn append(
        &self,
        kind: StoreKind,
        user_id: &UserId,
        records: Vec<Record>,
    ) -> Result<AppendStats, ApiError> {
        let mut received = self.received.write().map_err(|_| ApiError::LockPoisoned)?;
        Ok(received.append(kind, user_id, records))
    }

    pub fn received(&self, kind: StoreKind, user_id: &UserId) -> Result<Vec<Record>, ApiError> {
        let received = self.received.read().map_err(|_| ApiError::LockPoisoned)?;
        Ok(received.read(kind, user_id))
    }

    pub fn clear(&self, user_id: &UserId) -> Result<(), ApiError> {
        let mut received = self.received.write().map_err(|_| ApiError::LockPoisoned)?;
        received.clear_user(user_id);
        Ok(())
    }
}
