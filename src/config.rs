//! Configuration management for process-stats-exporter.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use process_stats_exporter::{LabelSet, Selection};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, Level};

use crate::cli::{Args, ConfigFormat};

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9256;
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Process selection
    pub pids: Vec<u32>,
    #[serde(alias = "cmdline-regexps")]
    pub cmdline_regexps: Vec<String>,
    #[serde(alias = "proc-root")]
    pub proc_root: Option<PathBuf>,

    // Feature flags
    #[serde(alias = "enable-health")]
    pub enable_health: Option<bool>,
    #[serde(alias = "enable-telemetry")]
    pub enable_telemetry: Option<bool>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<String>,

    // TLS/SSL Configuration
    #[serde(alias = "enable-tls")]
    pub enable_tls: Option<bool>,
    #[serde(alias = "tls-cert-path")]
    pub tls_cert_path: Option<String>,
    #[serde(alias = "tls-key-path")]
    pub tls_key_path: Option<String>,

    /// Static labels added to every metric. Kept last so TOML output places
    /// the table after plain values.
    pub labels: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            pids: Vec::new(),
            cmdline_regexps: Vec::new(),
            proc_root: Some(PathBuf::from(DEFAULT_PROC_ROOT)),
            enable_health: Some(true),
            enable_telemetry: Some(true),
            log_level: Some("info".into()),
            enable_tls: Some(false),
            tls_cert_path: None,
            tls_key_path: None,
            labels: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Builds the process selection. Call after validation.
    pub fn selection(&self) -> Result<Selection, Box<dyn std::error::Error>> {
        if !self.pids.is_empty() {
            return Ok(Selection::Pids(self.pids.clone()));
        }
        let regexps = self
            .cmdline_regexps
            .iter()
            .map(|r| Regex::new(r))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Selection::CmdlineRegexps(regexps))
    }

    pub fn static_labels(&self) -> LabelSet {
        self.labels.clone()
    }

    pub fn proc_root(&self) -> PathBuf {
        self.proc_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROC_ROOT))
    }
}

/// Whether `name` is a valid Prometheus label name.
fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    !name.starts_with("__") && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parses a log level name. `Some(None)` means logging is off.
pub fn parse_log_level(level: &str) -> Option<Option<Level>> {
    match level.to_ascii_lowercase().as_str() {
        "off" => Some(None),
        "error" => Some(Some(Level::ERROR)),
        "warn" => Some(Some(Level::WARN)),
        "info" => Some(Some(Level::INFO)),
        "debug" => Some(Some(Level::DEBUG)),
        "trace" => Some(Some(Level::TRACE)),
        _ => None,
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    // Selection: exactly one mode
    match (cfg.pids.is_empty(), cfg.cmdline_regexps.is_empty()) {
        (true, true) => return Err("no PID or process command line regexps specified".into()),
        (false, false) => {
            return Err("pids and cmdline_regexps are mutually exclusive".into());
        }
        _ => {}
    }

    for regexp in &cfg.cmdline_regexps {
        if let Err(e) = Regex::new(regexp) {
            return Err(format!("Invalid cmdline regexp '{}': {}", regexp, e).into());
        }
    }

    if let Some(level) = cfg.log_level.as_deref() {
        if parse_log_level(level).is_none() {
            return Err(format!("Invalid log level '{}'", level).into());
        }
    }

    for name in cfg.labels.keys() {
        if !is_valid_label_name(name) {
            return Err(format!("Invalid label name '{}'", name).into());
        }
    }

    // TLS validation
    if cfg.enable_tls.unwrap_or(false) {
        let cert_path = cfg.tls_cert_path.as_deref();
        let key_path = cfg.tls_key_path.as_deref();

        match (cert_path, key_path) {
            (None, None) => {
                return Err(
                    "TLS is enabled but neither tls_cert_path nor tls_key_path are set".into(),
                );
            }
            (Some(_), None) => {
                return Err("TLS is enabled but tls_key_path is not set".into());
            }
            (None, Some(_)) => {
                return Err("TLS is enabled but tls_cert_path is not set".into());
            }
            (Some(cert), Some(key)) => {
                check_pem_file(cert, "certificate")?;
                check_pem_file(key, "private key")?;
            }
        }
    }

    Ok(())
}

/// Checks that a TLS file exists, is readable and not empty.
fn check_pem_file(path: &str, what: &str) -> Result<(), Box<dyn std::error::Error>> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() == 0 => Err(format!("TLS {} file is empty: {}", what, path).into()),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("TLS {} file not found: {}", what, path).into())
        }
        Err(e) => Err(format!("TLS {} file is not readable: {} ({})", what, path, e).into()),
    }
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }

    // A selection mode given on the CLI replaces the file's selection entirely
    if !args.pids.is_empty() {
        config.pids = args.pids.clone();
        config.cmdline_regexps.clear();
    }
    if !args.cmdline_regexps.is_empty() {
        config.cmdline_regexps = args.cmdline_regexps.clone();
        config.pids.clear();
    }

    for (key, value) in &args.labels {
        config.labels.insert(key.clone(), value.clone());
    }

    if let Some(level) = &args.log_level {
        config.log_level = Some(level.as_str().to_string());
    }

    if let Some(root) = &args.proc_root {
        config.proc_root = Some(root.clone());
    }

    // Feature flags
    if args.disable_health {
        config.enable_health = Some(false);
    }
    if args.disable_telemetry {
        config.enable_telemetry = Some(false);
    }

    // TLS configuration: CLI wins if provided
    if args.enable_tls {
        config.enable_tls = Some(true);
    }
    if let Some(cert_path) = &args.tls_cert {
        config.tls_cert_path = Some(cert_path.to_string_lossy().to_string());
    }
    if let Some(key_path) = &args.tls_key {
        config.tls_key_path = Some(key_path.to_string_lossy().to_string());
    }

    Ok(config)
}

/// Configuration loading with multiple format support
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            // Try default locations
            let defaults = [
                "/etc/process-stats-exporter/config.yaml",
                "/etc/process-stats-exporter/config.yml",
                "/etc/process-stats-exporter/config.json",
                "./process-stats-exporter.yaml",
                "./process-stats-exporter.yml",
                "./process-stats-exporter.json",
            ];

            match defaults.iter().find(|p| Path::new(p).exists()) {
                Some(p) => PathBuf::from(p),
                None => return Ok(Config::default()),
            }
        }
    };

    let content = fs::read_to_string(&path)?;
    parse_config(&content, path.extension().and_then(|s| s.to_str()))
        .inspect(|_| info!("Loaded configuration from: {}", path.display()))
}

/// Parses configuration content; the format is chosen by file extension.
pub fn parse_config(
    content: &str,
    extension: Option<&str>,
) -> Result<Config, Box<dyn std::error::Error>> {
    Ok(match extension {
        Some("json") => serde_json::from_str(content)?,
        Some("toml") => toml::from_str(content)?,
        // Default to YAML
        _ => serde_yaml::from_str(content)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };
    println!("{output}");
    Ok(())
}
