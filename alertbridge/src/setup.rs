use alertbridge_config::Config;
use alertbridge_statsd::MetricsConfig;
use anyhow::Result;

/// Validates settings that are accepted by the config file but cannot work at runtime.
pub fn check_config(config: &Config) -> Result<()> {
    if config.idle_interval().is_zero() {
        anyhow::bail!("the configured `idleInterval` must be greater than zero");
    }

    if config.zabbix_send_timeout().is_some_and(|timeout| timeout.is_zero()) {
        anyhow::bail!("the configured `zabbixSendTimeout` must be greater than zero");
    }

    if config.zabbix_host_default().is_empty() {
        alertbridge_log::warn!(
            "no `zabbixHostDefault` configured, alerts without a `{}` annotation are dropped",
            config.zabbix_host_annotation()
        );
    }

    Ok(())
}

/// Print spawn infos to the log.
pub fn dump_spawn_infos(config: &Config) {
    if config.path().as_os_str().is_empty() {
        alertbridge_log::info!("launching alertbridge without config file");
    } else {
        alertbridge_log::info!(
            "launching alertbridge from config file {}",
            config.path().display()
        );
    }
    alertbridge_log::info!(
        "  zabbix server: {}:{}",
        config.zabbix_server_host(),
        config.zabbix_server_port()
    );
    alertbridge_log::info!("  queue capacity: {}", config.queue_capacity());
    alertbridge_log::info!("  log level: {}", config.logging().level);
}

/// Initialize the metric system.
pub fn init_metrics(config: &Config) -> Result<()> {
    let Some(host) = config.statsd_addr() else {
        return Ok(());
    };

    alertbridge_statsd::init(MetricsConfig {
        prefix: config.metrics_prefix(),
        host,
        default_tags: config.metrics_default_tags().clone(),
    })?;

    Ok(())
}
