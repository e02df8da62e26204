use std::{io, net::SocketAddr, sync::Arc};

use axum::{Router, extract::DefaultBodyLimit, routing::any};
use thiserror::Error;

use crate::transport::{
    CLEAR_MESSAGES_PATH, COLLECTIONS_BATCH_PATH, COMPONENTS_PATH, MAX_HTTP_BODY_BYTES,
    RECEIVED_BATCH_MESSAGES_PATH, RECEIVED_MESSAGES_PATH, ReceiverRuntime, SharedRuntime, UP_PATH,
    routes,
};

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to build tokio runtime: {0}")]
    RuntimeBuild(#[source] io::Error),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("http server failed: {0}")]
    Serve(#[source] io::Error),
}

/// Routes every endpoint regardless of method; unknown paths fall through to 404.
pub fn router(runtime: SharedRuntime) -> Router {
    Router::new()
        .route(COMPONENTS_PATH, any(routes::post_components))
        .route(COLLECTIONS_BATCH_PATH, any(routes::post_collections_batch))
        .route(RECEIVED_MESSAGES_PATH, any(routes::get_received_messages))
        .route(
            RECEIVED_BATCH_MESSAGES_PATH,
            any(routes::get_received_batch_messages),
        )
        .route(CLEAR_MESSAGES_PATH, any(routes::post_clear_messages))
        .route(UP_PATH, any(routes::get_up))
        .with_state(runtime)
        .layer(DefaultBodyLimit::max(MAX_HTTP_BODY_BYTES))
}

pub fn serve_http_with_axum(
    receiver_runtime: ReceiverRuntime,
    bind_addr: SocketAddr,
    worker_threads: usize,
) -> Result<(), ServeError> {
    let worker_threads = worker_threads.max(1);
    let tokio_runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()
        .map_err(ServeError::RuntimeBuild)?;

    tokio_runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(bind_addr)
            .await
            .map_err(|source| ServeError::Bind {
                addr: bind_addr,
                source,
            })?;
        tracing::info!(
            op = "receiver.serve.listening",
            addr = %bind_addr,
            workers = worker_threads,
            "telemetry receiver listening"
        );

        let app = router(Arc::new(receiver_runtime));
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(ServeError::Serve)?;

        tracing::info!(op = "receiver.serve.stopped", "telemetry receiver stopped");
        Ok(())
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(op = "receiver.signal.ctrl_c", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(op = "receiver.signal.sigterm", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!(op = "receiver.serve.shutdown", "shutdown signal received");
}
