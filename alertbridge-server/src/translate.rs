//! Translation of alerts into Zabbix trapper values.

use alertbridge_config::Config;
use alertbridge_zabbix::Metric;

use crate::protocol::Alert;

/// Settings that control how alerts map to Zabbix items.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranslationRules {
    /// Annotation that names the Zabbix host of an alert.
    pub host_annotation: String,
    /// Host used for alerts without a host annotation.
    pub default_host: String,
    /// Prefix of every item key.
    pub key_prefix: String,
}

impl TranslationRules {
    /// Reads the translation settings from the configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            host_annotation: config.zabbix_host_annotation().to_owned(),
            default_host: config.zabbix_host_default().to_owned(),
            key_prefix: config.zabbix_key_prefix().to_owned(),
        }
    }

    fn resolve_host<'a>(&'a self, alert: &'a Alert) -> &'a str {
        match alert.annotations.get(&self.host_annotation) {
            Some(host) if !host.is_empty() => host,
            _ => &self.default_host,
        }
    }
}

/// Translates an alert into a trapper value.
///
/// The host is taken from the configured annotation and falls back to the default host. Alerts
/// that resolve to no host are skipped. The item key is the key prefix followed by the lowercased
/// `alertname` label, and the value is `"1"` for firing alerts and `"0"` otherwise.
pub fn translate(alert: &Alert, rules: &TranslationRules) -> Option<Metric> {
    let host = rules.resolve_host(alert);
    if host.is_empty() {
        return None;
    }

    let name = alert.name().unwrap_or_default().to_lowercase();
    let key = format!("{}.{name}", rules.key_prefix);
    let value = if alert.is_firing() { "1" } else { "0" };

    Some(Metric::new(host, key, value))
}
