//! The alertbridge server.
//!
//! The server receives notifications from the Prometheus Alertmanager webhook and turns each alert
//! into a value of a Zabbix trapper item:
//!
//! ```text
//!  POST /alerts ──▶ alert queue ──▶ AlertProcessor ──▶ ZabbixForwarder ──▶ Zabbix server
//!   (HttpServer)    (bounded)       translate+batch    sender protocol
//! ```
//!
//! # Ingestion
//!
//! The `/alerts` endpoint decodes the request body and places every alert into a bounded queue.
//! When the queue is full, the request waits until the processor has made room. The response is
//! sent only after all alerts of the request have been enqueued.
//!
//! # Translation
//!
//! Each alert is attributed to a Zabbix host, taken from a configurable annotation or the default
//! host. Alerts without a host are dropped. The item key is built from a configurable prefix and
//! the lowercased `alertname` label, and the value is `1` for firing and `0` for resolved alerts.
//! See [`translate`](translate::translate).
//!
//! # Batching
//!
//! The [`AlertProcessor`](services::processor::AlertProcessor) takes alerts from the queue as long
//! as they are immediately available. When the queue runs empty, all values collected so far are
//! sent in a single request. Failed requests are logged and the batch is dropped.
//!
//! # Shutdown
//!
//! On `SIGTERM` the HTTP server stops accepting connections, the processor closes the queue,
//! drains what is left and sends a last batch. The process waits for this up to the configured
//! `shutdownTimeout`. On `SIGINT` the process exits right away.
#![warn(missing_docs)]

mod endpoints;
mod middlewares;
mod service;
mod statsd;

pub mod protocol;
pub mod services;
pub mod translate;

use std::sync::Arc;

use alertbridge_config::Config;
use alertbridge_system::{Controller, Service};
use anyhow::Context;

pub use self::service::{ServiceState, create_runtime};
pub use self::services::server::{HttpServer, ServerError, make_app};

use crate::services::forwarder::ZabbixForwarder;
use crate::services::processor::AlertProcessor;
use crate::translate::TranslationRules;

/// Runs the alertbridge web server and the alert processor.
///
/// This effectively boots the entire server application. It blocks the current thread until a
/// shutdown signal is received or a fatal error happens. Behavior of the server is determined by
/// the `config` passed into this function.
pub fn run(config: Config) -> anyhow::Result<()> {
    let config = Arc::new(config);
    alertbridge_log::info!("alertbridge server starting");

    let runtime = create_runtime("main-rt").context("failed to create the tokio runtime")?;

    runtime.block_on(async {
        Controller::start(config.shutdown_timeout());

        let processor = AlertProcessor::new(
            TranslationRules::from_config(&config),
            ZabbixForwarder::from_config(&config),
            config.idle_interval(),
        );
        let (alerts, processor) = processor.start(config.queue_capacity());

        let service = ServiceState::new(config.clone(), alerts);
        let mut server = tokio::spawn(HttpServer::new(service)?.serve());

        let mut shutdown = Controller::shutdown_handle();
        let timeout = tokio::select! {
            biased;

            shutdown = shutdown.notified() => shutdown.timeout,
            result = &mut server => {
                result.context("http server panicked")??;
                anyhow::bail!("http server stopped unexpectedly");
            }
        };

        let Some(timeout) = timeout else {
            alertbridge_log::info!("stopping immediately, dropping pending alerts");
            return anyhow::Ok(());
        };

        let finished = async {
            server.await.ok();
            processor.await.ok();
        };

        if tokio::time::timeout(timeout, finished).await.is_err() {
            alertbridge_log::warn!("shutdown timed out, dropping pending alerts");
        }

        anyhow::Ok(())
    })?;

    // Pending tasks are cancelled when the runtime is dropped.
    drop(runtime);
    alertbridge_log::info!("alertbridge shutdown complete");

    Ok(())
}
