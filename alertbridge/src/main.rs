//! alertbridge receives notifications from the Prometheus Alertmanager webhook and forwards each
//! alert as a value of a Zabbix trapper item.
//!
//! # Workspace Crates
//!
//! alertbridge is split into the following workspace crates:
//!
//!  - `alertbridge`: Main entry point and command line interface.
//!  - [`alertbridge-config`]: Static configuration for the CLI and server.
//!  - [`alertbridge-log`]: Logging facade and initialization.
//!  - [`alertbridge-server`]: Endpoints and services.
//!  - [`alertbridge-statsd`]: High-level StatsD metric client for internal measurements.
//!  - [`alertbridge-system`]: Foundational system components for alertbridge's services.
//!  - [`alertbridge-zabbix`]: Client for the Zabbix sender protocol.
//!
//! [`alertbridge-config`]: ../alertbridge_config/index.html
//! [`alertbridge-log`]: ../alertbridge_log/index.html
//! [`alertbridge-server`]: ../alertbridge_server/index.html
//! [`alertbridge-statsd`]: ../alertbridge_statsd/index.html
//! [`alertbridge-system`]: ../alertbridge_system/index.html
//! [`alertbridge-zabbix`]: ../alertbridge_zabbix/index.html

mod cli;
mod cliapp;
mod setup;

use std::process;

pub fn main() {
    let exit_code = match cli::execute() {
        Ok(()) => 0,
        Err(err) => {
            alertbridge_log::ensure_error(&err);
            1
        }
    };

    process::exit(exit_code);
}
