use std::path::PathBuf;

use alertbridge_config::{Config, OverridableConfig};
use anyhow::{Context, Result};
use clap::ArgMatches;

use crate::cliapp::make_app;
use crate::setup;

/// Runs the command line application.
pub fn execute() -> Result<()> {
    let app = make_app();
    let matches = app.get_matches();

    let config_path = matches
        .get_one::<PathBuf>("config")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("./config.yaml"));

    let mut config = Config::from_path(&config_path).with_context(|| {
        format!(
            "failed to load the configuration from {}",
            config_path.display()
        )
    })?;

    if let Some(matches) = matches.subcommand_matches("config") {
        manage_config(&config, matches)
    } else if let Some(matches) = matches.subcommand_matches("run") {
        config.apply_override(extract_config_args(matches))?;
        run(config)
    } else {
        unreachable!();
    }
}

/// Extracts config overrides from the `run` subcommand.
fn extract_config_args(matches: &ArgMatches) -> OverridableConfig {
    OverridableConfig {
        host: matches.get_one("host").cloned(),
        port: matches.get_one("port").cloned(),
        queue_capacity: matches.get_one("queue_capacity").cloned(),
        zabbix_server_host: matches.get_one("zabbix_server_host").cloned(),
        zabbix_server_port: matches.get_one("zabbix_server_port").cloned(),
        zabbix_host_default: matches.get_one("zabbix_host_default").cloned(),
        log_level: matches.get_one("log_level").cloned(),
    }
}

pub fn manage_config(config: &Config, matches: &ArgMatches) -> Result<()> {
    if let Some(matches) = matches.subcommand_matches("show") {
        match matches.get_one::<String>("format").map(String::as_str) {
            Some("debug") => {
                #[allow(clippy::print_stdout)]
                {
                    println!("{config:#?}");
                }
            }
            Some("yaml") | None => {
                let yaml = config.to_yaml_string()?;
                #[allow(clippy::print_stdout)]
                {
                    println!("{yaml}");
                }
            }
            _ => unreachable!(),
        }
        Ok(())
    } else {
        unreachable!();
    }
}

pub fn run(config: Config) -> Result<()> {
    alertbridge_log::init(config.logging());
    setup::check_config(&config)?;
    setup::dump_spawn_infos(&config);
    setup::init_metrics(&config)?;

    alertbridge_server::run(config)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_config_args() {
        let matches = make_app().get_matches_from([
            "alertbridge",
            "run",
            "--port",
            "9090",
            "--zabbix-server-host",
            "zabbix.local",
            "--log-level",
            "debug",
        ]);
        let run_matches = matches.subcommand_matches("run").unwrap();

        let mut config = Config::default();
        config
            .apply_override(extract_config_args(run_matches))
            .unwrap();

        assert_eq!(config.listen_addr().port(), 9090);
        assert_eq!(config.zabbix_server_host(), "zabbix.local");
        assert_eq!(
            config.logging().level,
            alertbridge_log::Level::Debug
        );
        assert_eq!(config.queue_capacity(), 500);
    }

    #[test]
    fn test_config_from_file_with_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"port: 8081\nqueueCapacity: 20\n").unwrap();

        let mut config = Config::from_path(file.path()).unwrap();
        let matches = make_app().get_matches_from(["alertbridge", "run", "--queue-capacity", "5"]);
        config
            .apply_override(extract_config_args(matches.subcommand_matches("run").unwrap()))
            .unwrap();

        assert_eq!(config.listen_addr().port(), 8081);
        assert_eq!(config.queue_capacity(), 5);
    }
}
