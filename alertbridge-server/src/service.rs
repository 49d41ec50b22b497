use std::sync::Arc;

use alertbridge_config::Config;
use alertbridge_system::Addr;
use tokio::runtime::Runtime;

use crate::protocol::Alert;

/// Constructs a tokio [`Runtime`] configured for running [services](alertbridge_system::Service).
pub fn create_runtime(name: &str) -> std::io::Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .thread_name(name)
        .enable_all()
        .build()
}

/// Server state shared with all endpoints.
#[derive(Clone, Debug)]
pub struct ServiceState {
    config: Arc<Config>,
    alerts: Addr<Alert>,
}

impl ServiceState {
    /// Creates the state from the configuration and the address of the alert queue.
    pub fn new(config: Arc<Config>, alerts: Addr<Alert>) -> Self {
        Self { config, alerts }
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the address of the alert queue.
    pub fn alerts(&self) -> &Addr<Alert> {
        &self.alerts
    }
}
