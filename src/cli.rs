//! CLI arguments and subcommands for process-stats-exporter.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Parses a `key=value` static label.
fn parse_label(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("invalid label '{s}', expected key=value")),
    }
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "process-stats-exporter",
    about = "Prometheus exporter for per-process statistics",
    long_about = "Prometheus exporter for per-process statistics.\n\n\
                  Exposes CPU time, memory, page faults, context switches and task states \
                  for processes selected by PID or by regular expressions matched against \
                  their command line.",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Process PIDs to report on
    #[arg(short = 'P', long, num_args = 1.., value_name = "PID", conflicts_with = "cmdline_regexps")]
    pub pids: Vec<u32>,

    /// Regular expressions matched against process command lines
    #[arg(short = 'R', long, num_args = 1.., value_name = "REGEXP")]
    pub cmdline_regexps: Vec<String>,

    /// Static label added to every metric (key=value, repeatable)
    #[arg(short = 'L', long = "label", value_parser = parse_label, value_name = "KEY=VALUE")]
    pub labels: Vec<(String, String)>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level [default: info]
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Root of the proc filesystem
    #[arg(long)]
    pub proc_root: Option<PathBuf>,

    /// Disable /health endpoint
    #[arg(long)]
    pub disable_health: bool,

    /// Disable internal process_stats_exporter_* metrics
    #[arg(long)]
    pub disable_telemetry: bool,

    /// Enable TLS/SSL for HTTPS
    #[arg(long)]
    pub enable_tls: bool,

    /// Path to TLS certificate file (PEM format)
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// Path to TLS private key file (PEM format)
    #[arg(long)]
    pub tls_key: Option<PathBuf>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration and /proc access
    Check,

    /// Run update cycles once and print the resulting metrics
    Test {
        /// Number of update cycles
        #[arg(short = 'n', long, default_value_t = 1)]
        iterations: usize,

        /// Show per-cycle summaries
        #[arg(long)]
        verbose: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_label() {
        assert_eq!(
            parse_label("env=prod").unwrap(),
            ("env".to_string(), "prod".to_string())
        );
        assert_eq!(
            parse_label("empty=").unwrap(),
            ("empty".to_string(), String::new())
        );
        assert!(parse_label("novalue").is_err());
        assert!(parse_label("=x").is_err());
    }

    #[test]
    fn test_args_pids_and_labels() {
        let args = Args::try_parse_from([
            "process-stats-exporter",
            "-P",
            "10",
            "20",
            "-L",
            "env=prod",
            "-L",
            "dc=eu",
        ])
        .unwrap();
        assert_eq!(args.pids, vec![10, 20]);
        assert!(args.cmdline_regexps.is_empty());
        assert_eq!(args.labels.len(), 2);
    }

    #[test]
    fn test_args_modes_conflict() {
        let res = Args::try_parse_from(["process-stats-exporter", "-P", "1", "-R", "nginx"]);
        assert!(res.is_err());
    }
}
