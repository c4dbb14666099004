//! Command-line interface handling for the event callbacks runner.
//!
//! Options here override the matching settings from the configuration file.

use clap::{Arg, ArgMatches, Command};
use event_callbacks::KeyPolicy;
use std::ffi::OsString;
use std::path::PathBuf;

/// Configuration file used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "event-callbacks.toml";

/// Command line arguments parsed from user input.
#[derive(Debug, Clone, PartialEq)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Optional override for the registration key policy
    pub key_policy: Option<KeyPolicy>,
}

impl CliArgs {
    /// Parses the process arguments. Exits with usage on invalid input.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    /// Parses an explicit argument list, the first item being the binary name.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Ok(Self::from_matches(&command().try_get_matches_from(args)?))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            key_policy: matches
                .get_one::<String>("policy")
                .and_then(|policy| parse_policy(policy)),
        }
    }
}

fn command() -> Command {
    Command::new("Event Callbacks")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Replays one-shot and persistent callback scenarios against an in-process event bus")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value(DEFAULT_CONFIG_PATH),
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
        .arg(
            Arg::new("policy")
                .short('p')
                .long("policy")
                .value_name("POLICY")
                .help("Registration key policy")
                .value_parser(["shared", "per-registration"]),
        )
}

fn parse_policy(policy: &str) -> Option<KeyPolicy> {
    match policy {
        "shared" => Some(KeyPolicy::SharedByEventType),
        "per-registration" => Some(KeyPolicy::PerRegistration),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = CliArgs::try_parse_from(["event-callbacks"]).unwrap();
        assert_eq!(args.config_path, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert_eq!(args.log_level, None);
        assert!(!args.json_logs);
        assert_eq!(args.key_policy, None);
    }

    #[test]
    fn test_overrides() {
        let args = CliArgs::try_parse_from([
            "event-callbacks",
            "-c",
            "custom.toml",
            "--log-level",
            "debug",
            "--json-logs",
            "-p",
            "shared",
        ])
        .unwrap();

        assert_eq!(args.config_path, PathBuf::from("custom.toml"));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.json_logs);
        assert_eq!(args.key_policy, Some(KeyPolicy::SharedByEventType));
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let result = CliArgs::try_parse_from(["event-callbacks", "--policy", "random"]);
        assert!(result.is_err());
    }
}
