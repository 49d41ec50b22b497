use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use alertbridge_log::{Level, LogConfig};
use serde::{Deserialize, Serialize};

/// Defines the source of a config error
#[derive(Debug, Default)]
enum ConfigErrorSource {
    /// An error occurring independently.
    #[default]
    None,
    /// An error originating from a configuration file.
    File(PathBuf),
    /// An error originating in a field override (an env var, or a CLI parameter).
    FieldOverride(String),
}

impl fmt::Display for ConfigErrorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigErrorSource::None => Ok(()),
            ConfigErrorSource::File(file_name) => write!(f, " (file {})", file_name.display()),
            ConfigErrorSource::FieldOverride(name) => write!(f, " (field {name})"),
        }
    }
}

/// Indicates config related errors.
#[derive(Debug)]
pub struct ConfigError {
    origin: ConfigErrorSource,
    kind: ConfigErrorKind,
    cause: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl ConfigError {
    #[inline]
    fn new(kind: ConfigErrorKind) -> Self {
        Self {
            origin: ConfigErrorSource::None,
            kind,
            cause: None,
        }
    }

    #[inline]
    fn wrap<E>(cause: E, kind: ConfigErrorKind) -> Self
    where
        E: Into<Box<dyn Error + Send + Sync + 'static>>,
    {
        Self {
            origin: ConfigErrorSource::None,
            kind,
            cause: Some(cause.into()),
        }
    }

    #[inline]
    fn for_field<E>(cause: E, field: &'static str) -> Self
    where
        E: Into<Box<dyn Error + Send + Sync + 'static>>,
    {
        Self::wrap(cause, ConfigErrorKind::InvalidValue).field(field)
    }

    #[inline]
    fn file<P: AsRef<Path>>(mut self, p: P) -> Self {
        self.origin = ConfigErrorSource::File(p.as_ref().to_path_buf());
        self
    }

    #[inline]
    fn field(mut self, name: &'static str) -> Self {
        self.origin = ConfigErrorSource::FieldOverride(name.to_owned());
        self
    }

    /// Returns the error kind of the error.
    pub fn kind(&self) -> ConfigErrorKind {
        self.kind
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind, self.origin)
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause.as_ref().map(|cause| &**cause as &(dyn Error + 'static))
    }
}

/// Indicates config related errors.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ConfigErrorKind {
    /// Failed to open the file.
    #[error("could not open config file")]
    CouldNotOpenFile,
    /// Failed to save a file.
    #[error("could not write config file")]
    CouldNotWriteFile,
    /// Parsing YAML failed.
    #[error("could not parse yaml config file")]
    BadYaml,
    /// Parsing JSON failed.
    #[error("could not parse json config file")]
    BadJson,
    /// Invalid config value
    #[error("invalid config value")]
    InvalidValue,
}

/// Structure used to hold information about configuration overrides via
/// CLI parameters or environment variables
#[derive(Debug, Default)]
pub struct OverridableConfig {
    /// The host the HTTP server should bind to (network interface).
    pub host: Option<String>,
    /// The port to bind for the HTTP server.
    pub port: Option<String>,
    /// The capacity of the alert queue.
    pub queue_capacity: Option<String>,
    /// The host of the Zabbix server or proxy.
    pub zabbix_server_host: Option<String>,
    /// The trapper port of the Zabbix server or proxy.
    pub zabbix_server_port: Option<String>,
    /// The Zabbix host used for alerts without a host annotation.
    pub zabbix_host_default: Option<String>,
    /// The log level.
    pub log_level: Option<String>,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

/// Internal statsd metrics.
#[derive(Serialize, Deserialize, Debug)]
#[serde(default, rename_all = "camelCase")]
struct Metrics {
    /// Hostname and port of the statsd server.
    ///
    /// Defaults to `None`, which disables internal metrics.
    statsd: Option<String>,
    /// Common prefix that should be added to all metrics.
    prefix: String,
    /// Default tags that should be attached to all metrics.
    default_tags: BTreeMap<String, String>,
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics {
            statsd: None,
            prefix: "alertbridge".to_owned(),
            default_tags: BTreeMap::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(default, rename_all = "camelCase")]
struct ConfigValues {
    /// The interface the HTTP server binds to.
    host: IpAddr,
    /// The port of the HTTP server.
    port: u16,
    /// Maximum number of alerts buffered between the webhook and the processor.
    queue_capacity: usize,
    zabbix_server_host: String,
    zabbix_server_port: u16,
    /// Host used for alerts that carry no host annotation.
    zabbix_host_default: String,
    /// Name of the alert annotation that holds the Zabbix host.
    zabbix_host_annotation: String,
    /// Prefix of all item keys.
    zabbix_key_prefix: String,
    /// Timeout for a single send to Zabbix in seconds.
    ///
    /// Unset means that a send may block indefinitely.
    #[serde(skip_serializing_if = "Option::is_none")]
    zabbix_send_timeout: Option<u64>,
    /// How long the processor waits for new alerts before checking the queue again, in
    /// milliseconds.
    idle_interval: u64,
    /// Time in seconds to drain pending alerts on graceful shutdown.
    shutdown_timeout: u64,
    logging: LogConfig,
    metrics: Metrics,
}

impl Default for ConfigValues {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: 8080,
            queue_capacity: 500,
            zabbix_server_host: "127.0.0.1".to_owned(),
            zabbix_server_port: 10051,
            zabbix_host_default: String::new(),
            zabbix_host_annotation: "zabbix_host".to_owned(),
            zabbix_key_prefix: "prometheus".to_owned(),
            zabbix_send_timeout: None,
            idle_interval: 1000,
            shutdown_timeout: 10,
            logging: LogConfig::default(),
            metrics: Metrics::default(),
        }
    }
}

/// Config struct.
pub struct Config {
    values: ConfigValues,
    path: PathBuf,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("path", &self.path)
            .field("values", &self.values)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            values: ConfigValues::default(),
            path: PathBuf::new(),
        }
    }
}

impl Config {
    /// Loads a config from the given YAML file.
    ///
    /// An empty file yields the default configuration.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::CouldNotOpenFile).file(path))?;

        let values = if contents.trim().is_empty() {
            ConfigValues::default()
        } else {
            serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::BadYaml).file(path))?
        };

        let config = Config {
            values,
            path: path.to_path_buf(),
        };

        config.validate().map_err(|e| e.file(path))?;
        Ok(config)
    }

    /// Creates a config from a JSON value.
    ///
    /// This is mostly useful for tests.
    pub fn from_json_value(value: serde_json::Value) -> Result<Config, ConfigError> {
        let config = Config {
            values: serde_json::from_value(value)
                .map_err(|err| ConfigError::wrap(err, ConfigErrorKind::BadJson))?,
            path: PathBuf::new(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Override configuration with values coming from other sources (e.g. env variables or
    /// command line parameters)
    pub fn apply_override(
        &mut self,
        overrides: OverridableConfig,
    ) -> Result<&mut Self, ConfigError> {
        let values = &mut self.values;

        if let Some(host) = overrides.host {
            values.host = host
                .parse::<IpAddr>()
                .map_err(|err| ConfigError::for_field(err, "host"))?;
        }

        if let Some(port) = overrides.port {
            values.port = port
                .parse()
                .map_err(|err| ConfigError::for_field(err, "port"))?;
        }

        if let Some(queue_capacity) = overrides.queue_capacity {
            values.queue_capacity = queue_capacity
                .parse()
                .map_err(|err| ConfigError::for_field(err, "queueCapacity"))?;
        }

        if let Some(zabbix_server_host) = overrides.zabbix_server_host {
            values.zabbix_server_host = zabbix_server_host;
        }

        if let Some(zabbix_server_port) = overrides.zabbix_server_port {
            values.zabbix_server_port = zabbix_server_port
                .parse()
                .map_err(|err| ConfigError::for_field(err, "zabbixServerPort"))?;
        }

        if let Some(zabbix_host_default) = overrides.zabbix_host_default {
            values.zabbix_host_default = zabbix_host_default;
        }

        if let Some(log_level) = overrides.log_level {
            values.logging.level = log_level
                .parse::<Level>()
                .map_err(|err| ConfigError::for_field(err, "logging.level"))?;
        }

        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.values.zabbix_server_host.is_empty() {
            return Err(ConfigError::new(ConfigErrorKind::InvalidValue).field("zabbixServerHost"));
        }

        Ok(())
    }

    /// Returns the filename of the config file.
    ///
    /// Empty if the config was not loaded from a file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Dumps out a YAML string of the values.
    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(&self.values)
            .map_err(|err| ConfigError::wrap(err, ConfigErrorKind::CouldNotWriteFile))
    }

    /// Returns the socket address the HTTP server binds to.
    pub fn listen_addr(&self) -> SocketAddr {
        (self.values.host, self.values.port).into()
    }

    /// Returns the maximum number of alerts buffered before the webhook applies back-pressure.
    ///
    /// A configured capacity of `0` yields a queue holding a single alert, so every webhook
    /// request waits for the processor to take its alerts one by one.
    pub fn queue_capacity(&self) -> usize {
        self.values.queue_capacity.max(1)
    }

    /// Returns the host of the Zabbix server.
    pub fn zabbix_server_host(&self) -> &str {
        &self.values.zabbix_server_host
    }

    /// Returns the trapper port of the Zabbix server.
    pub fn zabbix_server_port(&self) -> u16 {
        self.values.zabbix_server_port
    }

    /// Returns the Zabbix host for alerts without a host annotation.
    ///
    /// An empty string means that such alerts are not forwarded.
    pub fn zabbix_host_default(&self) -> &str {
        &self.values.zabbix_host_default
    }

    /// Returns the name of the annotation that carries the Zabbix host.
    pub fn zabbix_host_annotation(&self) -> &str {
        &self.values.zabbix_host_annotation
    }

    /// Returns the prefix of all item keys.
    pub fn zabbix_key_prefix(&self) -> &str {
        &self.values.zabbix_key_prefix
    }

    /// Returns the timeout for a single send to Zabbix, if configured.
    pub fn zabbix_send_timeout(&self) -> Option<Duration> {
        self.values.zabbix_send_timeout.map(Duration::from_secs)
    }

    /// Returns the interval the processor waits for alerts before re-checking the queue.
    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.values.idle_interval)
    }

    /// Returns the grace period for draining pending alerts on graceful shutdown.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.values.shutdown_timeout)
    }

    /// Returns the logging configuration.
    pub fn logging(&self) -> &LogConfig {
        &self.values.logging
    }

    /// Returns the address of the statsd server, if internal metrics are enabled.
    pub fn statsd_addr(&self) -> Option<&str> {
        self.values.metrics.statsd.as_deref()
    }

    /// Returns the prefix of internal metrics.
    pub fn metrics_prefix(&self) -> &str {
        &self.values.metrics.prefix
    }

    /// Returns the default tags attached to all internal metrics.
    pub fn metrics_default_tags(&self) -> &BTreeMap<String, String> {
        &self.values.metrics.default_tags
    }
}
