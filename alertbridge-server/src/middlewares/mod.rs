//! Middlewares for the HTTP server.
//!
//! This module exposes tower [layers](tower::Layer) and related utilities to configure the axum
//! HTTP server. The middlewares are registered as a layer on the [`Router`](axum::Router).
//!
//! See the server startup in [`HttpServer`](crate::services::server::HttpServer) for where these
//! middlewares are registered.

mod handle_panic;
mod metrics;
mod trace;

pub use self::handle_panic::*;
pub use self::metrics::*;
pub use self::trace::*;
