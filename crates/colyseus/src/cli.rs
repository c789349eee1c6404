//! Command-line interface handling.

use clap::{Arg, Command};
use std::fmt;
use std::path::PathBuf;

/// Which service this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    /// The shared spatial index that matches publications and subscriptions.
    Locator,
    /// A game node owning primaries and holding replicas.
    #[default]
    Node,
}

impl Role {
    fn from_arg(value: &str) -> Self {
        match value {
            "locator" => Role::Locator,
            _ => Role::Node,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Locator => write!(f, "locator"),
            Role::Node => write!(f, "node"),
        }
    }
}

/// Command line arguments parsed from user input.
///
/// Everything except the config path and role overrides a value from the
/// configuration file.
#[derive(Debug, Clone)]
pub struct CliArgs {
    pub config_path: PathBuf,
    pub role: Role,
    /// Overrides `[node] id`
    pub node_id: Option<u32>,
    /// Listen address of the selected role
    pub bind_address: Option<String>,
    pub locator_address: Option<String>,
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
}

impl CliArgs {
    /// Parses command line arguments using clap.
    ///
    /// Options left out on the command line stay `None` so that the values
    /// from the configuration file apply.
    ///
    /// # Returns
    ///
    /// A `CliArgs` instance containing all parsed command-line options.
    ///
    /// # Panics
    ///
    /// Never in practice: clap prints usage and exits the process on invalid
    /// input, such as an unknown `--role` or a non-numeric `--node-id`.
    pub fn parse() -> Self {
        Self::from_matches(&Self::command().get_matches())
    }

    fn command() -> Command {
        Command::new("Colyseus")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Interest-scoped object replication: locator and game node")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path")
                    .default_value("config.toml"),
            )
            .arg(
                Arg::new("role")
                    .short('r')
                    .long("role")
                    .value_name("ROLE")
                    .help("Service to run")
                    .value_parser(["locator", "node"])
                    .default_value("node"),
            )
            .arg(
                Arg::new("node-id")
                    .short('n')
                    .long("node-id")
                    .value_name("ID")
                    .help("Identifier of this node")
                    .value_parser(clap::value_parser!(u32)),
            )
            .arg(
                Arg::new("bind")
                    .short('b')
                    .long("bind")
                    .value_name("ADDRESS")
                    .help("Bind address (e.g., 127.0.0.1:9001)"),
            )
            .arg(
                Arg::new("locator")
                    .long("locator")
                    .value_name("ADDRESS")
                    .help("Locator address a node publishes to"),
            )
            .arg(
                Arg::new("log-level")
                    .short('l')
                    .long("log-level")
                    .value_name("LEVEL")
                    .help("Log level (trace, debug, info, warn, error)"),
            )
            .arg(
                Arg::new("json-logs")
                    .long("json-logs")
                    .help("Output logs in JSON format")
                    .action(clap::ArgAction::SetTrue),
            )
    }

    fn from_matches(matches: &clap::ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config.toml")),
            role: matches
                .get_one::<String>("role")
                .map(|role| Role::from_arg(role))
                .unwrap_or_default(),
            node_id: matches.get_one::<u32>("node-id").copied(),
            bind_address: matches.get_one::<String>("bind").cloned(),
            locator_address: matches.get_one::<String>("locator").cloned(),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        let matches = CliArgs::command()
            .try_get_matches_from(args)
            .expect("arguments should parse");
        CliArgs::from_matches(&matches)
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["colyseus"]);
        assert_eq!(args.config_path, PathBuf::from("config.toml"));
        assert_eq!(args.role, Role::Node);
        assert!(args.node_id.is_none());
        assert!(args.bind_address.is_none());
        assert!(!args.json_logs);
    }

    #[test]
    fn test_overrides() {
        let args = parse(&[
            "colyseus",
            "--config",
            "cluster.toml",
            "--role",
            "locator",
            "--node-id",
            "7",
            "--bind",
            "0.0.0.0:9000",
            "--log-level",
            "debug",
            "--json-logs",
        ]);
        assert_eq!(args.config_path, PathBuf::from("cluster.toml"));
        assert_eq!(args.role, Role::Locator);
        assert_eq!(args.node_id, Some(7));
        assert_eq!(args.bind_address.as_deref(), Some("0.0.0.0:9000"));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.json_logs);
    }

    #[test]
    fn test_unknown_role_rejected() {
        let result = CliArgs::command().try_get_matches_from(["colyseus", "--role", "router"]);
        assert!(result.is_err());
    }
}
