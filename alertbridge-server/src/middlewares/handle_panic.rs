use std::any::Any;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
pub use tower_http::catch_panic::CatchPanicLayer;

/// Error body returned when a handler panics.
#[derive(Serialize)]
struct PanicResponse<'a> {
    detail: &'a str,
}

/// Handler function for the [`CatchPanicLayer`] middleware.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "no error details"
    };

    alertbridge_log::error!("panic in web handler: {detail}");

    let response = (
        StatusCode::INTERNAL_SERVER_ERROR,
        axum::Json(PanicResponse { detail }),
    );

    response.into_response()
}
