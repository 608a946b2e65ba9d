use clap::Parser;
use log::debug;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::exit;

use certinspect::config::{Config, ConfigError, DEFAULT_CONFIG_FILE};
use certinspect::Inspector;

mod metrics;
mod report;

/// certi - TLS certificate chain inspection tool
#[derive(Parser, Debug)]
#[command(
    name = "certi",
    version,
    after_help = "Examples:\n  certi --host example.com\n  certi --host 192.168.1.100 --port 3000\n  certi --host https://example.com:8443 --output summary"
)]
struct Args {
    /// Server host: name, name:port, [ipv6]:port or URL
    #[arg(long)]
    host: Option<String>,

    /// Server port (default: 443)
    #[arg(long, allow_negative_numbers = true)]
    port: Option<i32>,

    /// Connection and handshake timeout in seconds (default: 10)
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Output format: json, text or summary (default: json)
    #[arg(short, long, value_name = "FORMAT")]
    output: Option<String>,

    /// Configuration file (default: ./certi.toml when present)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Exit code to use when the leaf certificate has expired
    #[arg(long)]
    exit_code: Option<i32>,

    /// Push metrics to a Prometheus Push Gateway
    #[arg(long)]
    prometheus: bool,

    /// Prometheus Push Gateway address
    #[arg(long, value_name = "URL")]
    prometheus_address: Option<String>,

    /// Print an example configuration file and quit
    #[arg(long)]
    generate_config: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    if args.generate_config {
        println!("{}", Config::example_toml());
        exit(0);
    }

    match run(args) {
        Ok(code) => exit(code),
        Err(err) => {
            eprintln!("error: {}", err);
            exit(1);
        }
    }
}

fn run(args: Args) -> Result<i32, Box<dyn Error>> {
    let config = load_config(args)?;
    let target = config.target()?;
    let format = config.output_format()?;
    let inspector = Inspector::with_timeout(config.timeout()?);

    debug!(
        "Inspecting {}:{} with a {:?} timeout",
        target.hostname,
        target.port,
        inspector.timeout()
    );
    let inspection = inspector.inspect(&target.hostname, target.port)?;

    println!("{}", report::render(&inspection, format)?);

    if let Some(address) = config.prometheus_address() {
        metrics::prom::prometheus_metrics(&inspection, address);
    }

    if inspection.is_leaf_expired() {
        Ok(config.exit_code.unwrap_or(0))
    } else {
        Ok(0)
    }
}

/// Defaults, then the configuration file, then command-line arguments.
fn load_config(args: Args) -> Result<Config, ConfigError> {
    let file_config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => Config::from_file(DEFAULT_CONFIG_FILE)?,
        None => Config::empty(),
    };

    let cli_config = Config::from_cli_args(
        args.host,
        args.port,
        args.timeout,
        args.output,
        args.exit_code,
        args.prometheus.then_some(true),
        args.prometheus_address,
    );

    Ok(Config::default().merge_with(file_config).merge_with(cli_config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_cli_parses_all_options() {
        let args = Args::try_parse_from([
            "certi",
            "--host",
            "example.com",
            "--port",
            "8443",
            "--timeout",
            "3",
            "--output",
            "summary",
            "--exit-code",
            "2",
            "--prometheus",
            "--prometheus-address",
            "http://gateway:9091",
        ])
        .unwrap();

        assert_eq!(args.host.as_deref(), Some("example.com"));
        assert_eq!(args.port, Some(8443));
        assert_eq!(args.timeout, Some(3));
        assert!(args.prometheus);
    }

    #[test]
    fn test_negative_port_reaches_the_inspector() {
        let args = Args::try_parse_from(["certi", "--host", "example.com", "--port", "-1"]).unwrap();
        assert_eq!(args.port, Some(-1));
    }

    #[test]
    fn test_cli_overrides_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"host = \"file.example.com\"\noutput = \"text\"\ntimeout_secs = 4\n")
            .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let args = Args::try_parse_from([
            "certi",
            "--config",
            path.as_str(),
            "--host",
            "cli.example.com:8443",
        ])
        .unwrap();
        let config = load_config(args).unwrap();

        let target = config.target().unwrap();
        assert_eq!(target.hostname, "cli.example.com");
        assert_eq!(target.port, 8443);
        assert_eq!(config.output.as_deref(), Some("text"));
        assert_eq!(config.timeout_secs, Some(4));
        assert_eq!(config.prometheus_address(), None);
    }

    #[test]
    fn test_port_zero_fails_before_connecting() {
        let args = Args::try_parse_from(["certi", "--host", "invalid.:0", "--config", "/dev/null"]).unwrap();
        let err = run(args).unwrap_err();
        assert_eq!(err.to_string(), "invalid port: 0");
    }

    #[test]
    fn test_out_of_range_host_port_is_an_invalid_port() {
        let args =
            Args::try_parse_from(["certi", "--host", "invalid.:99999", "--config", "/dev/null"]).unwrap();
        let err = run(args).unwrap_err();
        assert_eq!(err.to_string(), "invalid port: 99999");
    }
}
