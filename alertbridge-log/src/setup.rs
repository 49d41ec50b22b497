use std::env;
use std::io;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, fmt as tracing_fmt};

use crate::{Level, LogConfig, LogFormat};

/// All crates of the workspace, which receive the configured log level.
///
/// Third-party crates are capped at `INFO` unless `RUST_LOG` says otherwise.
const CRATE_NAMES: &[&str] = &[
    "alertbridge",
    "alertbridge_config",
    "alertbridge_log",
    "alertbridge_server",
    "alertbridge_statsd",
    "alertbridge_system",
    "alertbridge_zabbix",
];

/// Builds the filter used when `RUST_LOG` is not set.
fn default_filter(level: Level) -> EnvFilter {
    let mut filter = EnvFilter::new("INFO");

    for name in CRATE_NAMES {
        if let Ok(directive) = format!("{name}={}", level.level_filter()).parse() {
            filter = filter.add_directive(directive);
        }
    }

    filter
}

/// Initialize the logging system.
///
/// Log records are written to stdout. Calling this more than once has no effect.
///
/// # Example
///
/// ```
/// let log_config = alertbridge_log::LogConfig {
///     enable_backtraces: true,
///     ..Default::default()
/// };
///
/// alertbridge_log::init(&log_config);
/// ```
pub fn init(config: &LogConfig) {
    if config.enable_backtraces {
        // SAFETY: Logging is initialized during startup before any threads are spawned.
        unsafe { env::set_var("RUST_BACKTRACE", "full") };
    }

    let filter = match env::var(EnvFilter::DEFAULT_ENV) {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) => default_filter(config.level),
    };

    let format = match (config.format, console::user_attended()) {
        (LogFormat::Auto, true) | (LogFormat::Pretty, _) => LogFormat::Pretty,
        (LogFormat::Auto, false) | (LogFormat::Simplified, _) => LogFormat::Simplified,
        (LogFormat::Json, _) => LogFormat::Json,
    };

    let layer = match format {
        LogFormat::Pretty => tracing_fmt::layer()
            .with_writer(io::stdout)
            .compact()
            .without_time()
            .boxed(),
        LogFormat::Json => tracing_fmt::layer()
            .with_writer(io::stdout)
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .boxed(),
        _ => tracing_fmt::layer()
            .with_writer(io::stdout)
            .with_ansi(false)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init()
        .ok();
}
