//! This module implements the definition of the command line app.

use std::path::PathBuf;

use clap::builder::PossibleValuesParser;
use clap::{Arg, ArgAction, Command, value_parser};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const ABOUT: &str = "Forwards Prometheus Alertmanager alerts to Zabbix.";

pub fn make_app() -> Command {
    Command::new("alertbridge")
        .disable_help_subcommand(true)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .propagate_version(true)
        .max_term_width(79)
        .version(VERSION)
        .about(ABOUT)
        .arg(
            Arg::new("config")
                .value_name("CONFIG")
                .long("config")
                .short('c')
                .global(true)
                .default_value("./config.yaml")
                .value_parser(value_parser!(PathBuf))
                .help("The path to the configuration file."),
        )
        .subcommand(
            Command::new("run")
                .about("Run the alertbridge server")
                .after_help(
                    "This runs alertbridge in the foreground until it's shut down. It will bind \
                     to the port and network interface configured in the config file.",
                )
                .arg(
                    Arg::new("host")
                        .value_name("HOST")
                        .long("host")
                        .env("ALERTBRIDGE_HOST")
                        .help("The network interface the HTTP server binds to."),
                )
                .arg(
                    Arg::new("port")
                        .value_name("PORT")
                        .long("port")
                        .short('p')
                        .env("ALERTBRIDGE_PORT")
                        .help("The port the HTTP server binds to."),
                )
                .arg(
                    Arg::new("queue_capacity")
                        .value_name("CAPACITY")
                        .long("queue-capacity")
                        .env("ALERTBRIDGE_QUEUE_CAPACITY")
                        .help("The number of alerts buffered before webhook requests wait."),
                )
                .arg(
                    Arg::new("zabbix_server_host")
                        .value_name("HOST")
                        .long("zabbix-server-host")
                        .env("ALERTBRIDGE_ZABBIX_SERVER_HOST")
                        .help("The host of the Zabbix server or proxy."),
                )
                .arg(
                    Arg::new("zabbix_server_port")
                        .value_name("PORT")
                        .long("zabbix-server-port")
                        .env("ALERTBRIDGE_ZABBIX_SERVER_PORT")
                        .help("The trapper port of the Zabbix server or proxy."),
                )
                .arg(
                    Arg::new("zabbix_host_default")
                        .value_name("HOST")
                        .long("zabbix-host-default")
                        .env("ALERTBRIDGE_ZABBIX_HOST_DEFAULT")
                        .help("The Zabbix host for alerts without a host annotation."),
                )
                .arg(
                    Arg::new("log_level")
                        .value_name("LEVEL")
                        .long("log-level")
                        .env("ALERTBRIDGE_LOG_LEVEL")
                        .help("The log level: off, error, warn, info, debug or trace."),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Manage the alertbridge config")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .after_help(
                    "This command provides basic config management. It can be used primarily \
                     to inspect the effective configuration after defaults were applied.",
                )
                .subcommand(
                    Command::new("show")
                        .about("Show the entire config out for debugging purposes")
                        .after_help(
                            "This dumps out the entire config including the values which are \
                             not in the config file but filled in from defaults. The default \
                             output format is YAML but the debug format can also be specific \
                             which is useful to understand how the config file is parsed.",
                        )
                        .arg(
                            Arg::new("format")
                                .short('f')
                                .long("format")
                                .default_value("yaml")
                                .value_parser(PossibleValuesParser::new(["debug", "yaml"]))
                                .action(ArgAction::Set)
                                .help("The output format"),
                        ),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_is_valid() {
        make_app().debug_assert();
    }

    #[test]
    fn test_default_config_path() {
        let matches = make_app().get_matches_from(["alertbridge", "run"]);
        assert_eq!(
            matches.get_one::<PathBuf>("config"),
            Some(&PathBuf::from("./config.yaml"))
        );
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let matches = make_app().get_matches_from(["alertbridge", "config", "show", "-c", "a.yml"]);
        assert_eq!(
            matches.get_one::<PathBuf>("config"),
            Some(&PathBuf::from("a.yml"))
        );

        let (_, config_matches) = matches.subcommand().unwrap();
        let (_, show_matches) = config_matches.subcommand().unwrap();
        assert_eq!(
            show_matches.get_one::<String>("format").map(String::as_str),
            Some("yaml")
        );
    }

    #[test]
    fn test_rejects_unknown_format() {
        let result =
            make_app().try_get_matches_from(["alertbridge", "config", "show", "--format", "json"]);
        assert!(result.is_err());
    }
}
