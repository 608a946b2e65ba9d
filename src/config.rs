//! Configuration file management for certi.
//!
//! Settings come from three layers with clear precedence:
//!
//! 1. Default values (lowest priority)
//! 2. Configuration file (`certi.toml` or specified with `--config`)
//! 3. Command-line arguments (highest priority)
//!
//! # Example Configuration File
//!
//! ```toml
//! host = "example.com"
//! port = 443
//! timeout_secs = 10
//! output = "summary"
//! exit_code = 1
//!
//! [prometheus]
//! enabled = true
//! address = "http://localhost:9091"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use strum_macros::{Display, EnumString};
use std::net::Ipv6Addr;
use url::Url;

use crate::{DEFAULT_PORT, DEFAULT_TIMEOUT};

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "certi.toml";

/// Main configuration structure for certi.
///
/// All fields are optional to support partial configuration and merging.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// Host to inspect: `name`, `name:port`, `[v6]:port` or a URL
    pub host: Option<String>,
    /// Port used when `host` does not carry one
    pub port: Option<i32>,
    /// Connection and handshake timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Output format: json, text, summary
    pub output: Option<String>,
    /// Exit code to use when the leaf certificate has expired
    pub exit_code: Option<i32>,
    /// Prometheus configuration
    pub prometheus: Option<PrometheusConfig>,
}

/// Prometheus Push Gateway settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PrometheusConfig {
    pub enabled: Option<bool>,
    /// Push gateway address (e.g., "http://localhost:9091")
    pub address: Option<String>,
}

/// How an inspection is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OutputFormat {
    Json,
    Text,
    Summary,
}

/// Endpoint to inspect, split out of the `host` setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub hostname: String,
    pub port: i32,
}

impl Default for Config {
    /// Defaults: port 443, 10 second timeout, JSON output, exit code 0,
    /// Prometheus disabled with gateway `http://localhost:9091`.
    fn default() -> Self {
        Config {
            host: None,
            port: Some(i32::from(DEFAULT_PORT)),
            timeout_secs: Some(DEFAULT_TIMEOUT.as_secs()),
            output: Some("json".to_string()),
            exit_code: Some(0),
            prometheus: Some(PrometheusConfig {
                enabled: Some(false),
                address: Some("http://localhost:9091".to_string()),
            }),
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully parsed configuration
    /// * `Err(ConfigError::Io)` - File could not be read
    /// * `Err(ConfigError::Parse)` - File contains invalid TOML
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use certinspect::config::Config;
    /// let config = Config::from_file("certi.toml")?;
    /// # Ok::<(), certinspect::config::ConfigError>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(config)
    }

    /// An all-`None` configuration, the neutral element of [`Config::merge_with`].
    pub fn empty() -> Self {
        Config {
            host: None,
            port: None,
            timeout_secs: None,
            output: None,
            exit_code: None,
            prometheus: None,
        }
    }

    /// Merges this configuration with another, prioritizing the other's values.
    ///
    /// ```
    /// # use certinspect::config::Config;
    /// let file_config = Config::from_file("certi.toml").unwrap_or_else(|_| Config::empty());
    /// let merged = Config::default().merge_with(file_config);
    /// assert!(merged.port.is_some());
    /// ```
    pub fn merge_with(mut self, other: Config) -> Self {
        if other.host.is_some() {
            self.host = other.host;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.timeout_secs.is_some() {
            self.timeout_secs = other.timeout_secs;
        }
        if other.output.is_some() {
            self.output = other.output;
        }
        if other.exit_code.is_some() {
            self.exit_code = other.exit_code;
        }
        if let Some(other_prom) = other.prometheus {
            if let Some(ref mut self_prom) = self.prometheus {
                if other_prom.enabled.is_some() {
                    self_prom.enabled = other_prom.enabled;
                }
                if other_prom.address.is_some() {
                    self_prom.address = other_prom.address;
                }
            } else {
                self.prometheus = Some(other_prom);
            }
        }
        self
    }

    /// Creates a Config from command-line arguments for merging.
    ///
    /// Only provided arguments (Some values) override other layers.
    pub fn from_cli_args(
        host: Option<String>,
        port: Option<i32>,
        timeout_secs: Option<u64>,
        output: Option<String>,
        exit_code: Option<i32>,
        prometheus: Option<bool>,
        prometheus_address: Option<String>,
    ) -> Self {
        Config {
            host,
            port,
            timeout_secs,
            output,
            exit_code,
            prometheus: Some(PrometheusConfig {
                enabled: prometheus,
                address: prometheus_address,
            }),
        }
    }

    /// Generates an example configuration file in TOML format.
    pub fn example_toml() -> String {
        let example = Config {
            host: Some("example.com:8443".to_string()),
            port: Some(443),
            timeout_secs: Some(10),
            output: Some("summary".to_string()),
            exit_code: Some(1),
            prometheus: Some(PrometheusConfig {
                enabled: Some(true),
                address: Some("http://localhost:9091".to_string()),
            }),
        };

        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| "# Error generating example".to_string())
    }

    /// Endpoint to inspect. A port embedded in `host` wins over `port`.
    pub fn target(&self) -> Result<Target, ConfigError> {
        let host = self
            .host
            .as_deref()
            .ok_or_else(|| ConfigError::Validation("host is required".to_string()))?;
        let default_port = self.port.unwrap_or_else(|| i32::from(DEFAULT_PORT));
        parse_target(host, default_port)
    }

    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        match self.timeout_secs {
            Some(0) => Err(ConfigError::Validation(
                "timeout_secs must be greater than zero".to_string(),
            )),
            Some(secs) => Ok(Duration::from_secs(secs)),
            None => Ok(DEFAULT_TIMEOUT),
        }
    }

    pub fn output_format(&self) -> Result<OutputFormat, ConfigError> {
        match self.output.as_deref() {
            Some(name) => name.parse().map_err(|_| {
                ConfigError::Validation(format!(
                    "unknown output format '{}', expected json, text or summary",
                    name
                ))
            }),
            None => Ok(OutputFormat::Json),
        }
    }

    pub fn prometheus_address(&self) -> Option<&str> {
        let prometheus = self.prometheus.as_ref()?;
        if prometheus.enabled == Some(true) {
            prometheus.address.as_deref()
        } else {
            None
        }
    }
}

/// Splits `input` into hostname and port.
///
/// Accepts `example.com`, `example.com:8443`, `192.0.2.1`, `2001:db8::1`,
/// `[2001:db8::1]:8443` and URLs such as `https://example.com:9443/path`.
/// The hostname keeps the caller's spelling and an explicit port is passed
/// through unchecked, so range errors surface from the inspector.
/// `default_port` applies when no port is present; URLs with a well-known
/// scheme use that scheme's port instead.
pub fn parse_target(input: &str, default_port: i32) -> Result<Target, ConfigError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ConfigError::Validation("host cannot be empty".to_string()));
    }

    let (scheme_port, rest) = match input.split_once("://") {
        Some((scheme, rest)) => (Some(known_port(input, scheme)?), rest),
        None => (None, input),
    };

    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let authority = authority
        .rsplit_once('@')
        .map_or(authority, |(_, host)| host);
    let (hostname, port) = split_host_port(input, authority)?;

    Ok(Target {
        hostname: hostname.to_string(),
        port: port
            .or(scheme_port.flatten())
            .unwrap_or(default_port),
    })
}

/// Default port registered for `scheme`, if any.
fn known_port(input: &str, scheme: &str) -> Result<Option<i32>, ConfigError> {
    let reference = Url::parse(&format!("{}://localhost", scheme))
        .map_err(|e| ConfigError::Validation(format!("invalid host '{}': {}", input, e)))?;
    Ok(reference.port_or_known_default().map(i32::from))
}

fn split_host_port<'a>(
    input: &str,
    authority: &'a str,
) -> Result<(&'a str, Option<i32>), ConfigError> {
    let invalid = |reason: &str| ConfigError::Validation(format!("invalid host '{}': {}", input, reason));

    let (hostname, port) = if let Some(bracketed) = authority.strip_prefix('[') {
        let (address, after) = bracketed
            .split_once(']')
            .ok_or_else(|| invalid("missing ']'"))?;
        if address.parse::<Ipv6Addr>().is_err() {
            return Err(invalid("not an IPv6 address"));
        }
        let port = match after {
            "" => None,
            _ => Some(after.strip_prefix(':').ok_or_else(|| invalid("junk after ']'"))?),
        };
        (address, port)
    } else if authority.matches(':').count() > 1 {
        // Unbracketed IPv6 literal, which cannot carry a port
        (authority, None)
    } else {
        match authority.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        }
    };

    if hostname.is_empty() {
        return Err(invalid("no hostname"));
    }
    let port = match port {
        Some(text) => Some(
            text.parse::<i32>()
                .map_err(|_| invalid(&format!("bad port '{}'", text)))?,
        ),
        None => None,
    };
    Ok((hostname, port))
}

/// Errors that can occur during configuration loading and parsing.
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error (file not found, permission denied, etc.)
    Io(String),
    /// TOML parsing error (invalid syntax, type mismatch, etc.)
    Parse(String),
    /// Validation error (missing required fields, invalid values, etc.)
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "IO Error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Parse Error: {}", msg),
            ConfigError::Validation(msg) => write!(f, "Validation Error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
