//! The webhook endpoint that receives alerts.

use alertbridge_statsd::metric;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, any};
use bytes::Bytes;

use crate::protocol::HookRequest;
use crate::service::ServiceState;
use crate::statsd::{BridgeCounters, BridgeGauges};

/// Accepts a webhook notification and enqueues all of its alerts.
///
/// Only `POST` is supported. The body is decoded as JSON regardless of the content type. The
/// response is sent once every alert has been placed in the queue, so a full queue slows down the
/// caller.
async fn handle(State(state): State<ServiceState>, method: Method, body: Bytes) -> Response {
    if method != Method::POST {
        metric!(counter(BridgeCounters::RequestsRejected) += 1, reason = "method");
        return (StatusCode::BAD_REQUEST, "unsupported HTTP method").into_response();
    }

    let request: HookRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(error) => {
            alertbridge_log::warn!("error decoding message: {error}");
            metric!(counter(BridgeCounters::RequestsRejected) += 1, reason = "body");
            return (StatusCode::BAD_REQUEST, "request body is not valid json").into_response();
        }
    };

    metric!(counter(BridgeCounters::AlertsReceived) += request.alerts.len() as i64);

    for alert in request.alerts {
        if state.alerts().send(alert).await.is_err() {
            return (StatusCode::SERVICE_UNAVAILABLE, "service is shutting down").into_response();
        }
    }

    metric!(gauge(BridgeGauges::QueueSize) = state.alerts().queue_size() as u64);
    StatusCode::OK.into_response()
}

/// Routes all methods to the webhook handler.
///
/// Alertmanager sends a whole alert group in one request, so the body size is not limited.
pub fn route() -> MethodRouter<ServiceState> {
    any(handle).route_layer(DefaultBodyLimit::disable())
}
