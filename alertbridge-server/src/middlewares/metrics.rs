use std::time::Instant;

use alertbridge_statsd::metric;
use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;

use crate::statsd::{BridgeCounters, BridgeTimers};

/// A middleware that logs request metrics.
///
/// This is instrumented with the following metrics:
///  - `requests`: counts all incoming requests
///  - `requests.duration`: time from receiving a request to sending the response
///  - `responses.status_codes`: counts responses by status code, route and method
pub async fn metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_default();
    let method = request.method().clone();

    metric!(counter(BridgeCounters::Requests) += 1);
    let response = next.run(request).await;

    metric!(
        timer(BridgeTimers::RequestsDuration) = start.elapsed(),
        route = &route,
        method = method.as_str(),
    );
    metric!(
        counter(BridgeCounters::ResponsesStatusCodes) += 1,
        status_code = response.status().as_str(),
        route = &route,
        method = method.as_str(),
    );

    response
}
