//! A simple health check endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::service::ServiceState;

#[derive(Serialize)]
struct Status {
    is_healthy: bool,
}

/// Reports healthy as long as the alert queue accepts alerts.
pub async fn handle(State(state): State<ServiceState>) -> impl IntoResponse {
    if state.alerts().is_closed() {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            axum::Json(Status { is_healthy: false }),
        )
    } else {
        (StatusCode::OK, axum::Json(Status { is_healthy: true }))
    }
}
