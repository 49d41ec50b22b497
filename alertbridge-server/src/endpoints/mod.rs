//! Web server endpoints.
//!
//! This module contains the webhook receiving alerts and the health check.

use axum::Router;
use axum::routing::get;

use crate::service::ServiceState;

mod alerts;
mod health;

/// Returns the router with all endpoints of the server.
pub fn routes() -> Router<ServiceState> {
    Router::new()
        .route("/alerts", alerts::route())
        .route("/health", get(health::handle))
}
