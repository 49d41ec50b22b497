//! Configuration for the alertbridge CLI and server.
//!
//! The configuration is loaded once from a single YAML file at startup and is immutable for the
//! lifetime of the process. Keys that are missing from the file fall back to their defaults, so an
//! empty file is a valid configuration:
//!
//! ```yaml
//! port: 8080
//! queueCapacity: 500
//! zabbixServerHost: 127.0.0.1
//! zabbixServerPort: 10051
//! zabbixHostDefault: ""
//! zabbixHostAnnotation: zabbix_host
//! zabbixKeyPrefix: prometheus
//! ```
//!
//! Individual values can be overridden from the command line or environment with
//! [`Config::apply_override`].

#![warn(missing_docs)]

mod config;

pub use self::config::*;
