pub mod api;
pub mod transport;
pub mod transport_axum;

pub use api::UpResponse;
pub use transport::{DecodeError, ReceiverRuntime, SharedRuntime, config::ReceiverConfig};
pub use transport_axum::{ServeError, router, serve_http_with_axum};
