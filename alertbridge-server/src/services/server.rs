//! The HTTP server hosting all endpoints.

use std::io;
use std::net::SocketAddr;

use alertbridge_statsd::metric;
use alertbridge_system::Controller;
use axum::Router;
use tokio::net::{TcpListener, TcpSocket};
use tower::ServiceBuilder;

use crate::middlewares::{self, CatchPanicLayer};
use crate::service::ServiceState;
use crate::statsd::BridgeCounters;

/// Maximum number of pending connections on the listening socket.
const LISTEN_BACKLOG: u32 = 1024;

/// Indicates the type of failure of the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Binding failed.
    #[error("bind to interface {addr} failed")]
    BindFailed {
        /// The address the server tried to bind to.
        addr: SocketAddr,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// The server stopped with an error while serving requests.
    #[error("http server failed")]
    ServeFailed(#[source] io::Error),
}

/// Build the axum application with all routes and middleware.
pub fn make_app(service: ServiceState) -> Router {
    // Build the router middleware into a single service which runs _after_ routing. Service
    // builder order defines layers added first will be called first. This means:
    //  - Requests go from top to bottom
    //  - Responses go from bottom to top
    let middleware = ServiceBuilder::new()
        .layer(axum::middleware::from_fn(middlewares::metrics))
        .layer(CatchPanicLayer::custom(middlewares::handle_panic))
        .layer(middlewares::trace_http_layer());

    crate::endpoints::routes()
        .layer(middleware)
        .with_state(service)
}

fn listen(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4(),
        SocketAddr::V6(_) => TcpSocket::new_v6(),
    }?;

    #[cfg(unix)]
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(LISTEN_BACKLOG)
}

/// HTTP server.
///
/// This is the main HTTP server of alertbridge which hosts all endpoints and dispatches incoming
/// traffic to them. The server stops accepting connections when a shutdown is triggered through
/// the [`Controller`] and finishes once all open requests have completed.
#[derive(Debug)]
pub struct HttpServer {
    service: ServiceState,
    listener: TcpListener,
}

impl HttpServer {
    /// Binds the listening socket for the configured address.
    ///
    /// Must be called within a Tokio runtime.
    pub fn new(service: ServiceState) -> Result<Self, ServerError> {
        let addr = service.config().listen_addr();
        let listener = listen(addr).map_err(|source| ServerError::BindFailed { addr, source })?;

        Ok(Self { service, listener })
    }

    /// Serves requests until a shutdown is triggered.
    pub async fn serve(self) -> Result<(), ServerError> {
        let Self { service, listener } = self;

        alertbridge_log::info!("spawning http server");
        if let Ok(addr) = listener.local_addr() {
            alertbridge_log::info!("  listening on http://{addr}/");
        }
        metric!(counter(BridgeCounters::ServerStarting) += 1);

        let mut shutdown = Controller::shutdown_handle();
        let app = make_app(service);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.notified().await;
                alertbridge_log::info!("shutting down http server");
            })
            .await
            .map_err(ServerError::ServeFailed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alertbridge_config::Config;
    use alertbridge_system::channel;

    use super::*;

    #[tokio::test]
    async fn test_bind_failure() {
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = occupied.local_addr().unwrap().port();

        let config = Config::from_json_value(serde_json::json!({
            "host": "127.0.0.1",
            "port": port,
        }))
        .unwrap();

        let (alerts, _rx) = channel("alerts", 1);
        let service = ServiceState::new(Arc::new(config), alerts);

        let error = HttpServer::new(service).unwrap_err();
        assert!(matches!(error, ServerError::BindFailed { .. }));
        assert_eq!(
            error.to_string(),
            format!("bind to interface 127.0.0.1:{port} failed")
        );
    }
}
