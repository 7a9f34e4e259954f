//! Server configuration
//!
//! Settings come from built-in defaults, then `DIGIT_INGEST_*` environment
//! variables, then command line flags, each layer overriding the previous one.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use lexopt::prelude::*;
use log::LevelFilter;

use super::http_request::RequestLimits;

pub const ENV_PORT: &str = "DIGIT_INGEST_PORT";
pub const ENV_DATA_DIR: &str = "DIGIT_INGEST_DATA_DIR";
pub const ENV_LOG_LEVEL: &str = "DIGIT_INGEST_LOG_LEVEL";

pub const USAGE: &str = "\
Usage: digit-ingest [OPTIONS]

Collects labelled digit drawings over HTTP.
GET lists submitters, POST stores a {label, id, img} submission.

Options:
  -p, --port <PORT>          Port to listen on [default: 8000]
  -b, --bind <ADDR>          Address to bind [default: 0.0.0.0]
  -d, --data-dir <PATH>      Directory holding user_ids.txt and images/ [default: .]
      --max-body <BYTES>     Largest accepted request body [default: 10485760]
      --read-timeout <SECS>  Time allowed to receive one request [default: 10]
      --log-level <LEVEL>    off, error, warn, info, debug or trace [default: info]
      --log-file <PATH>      Also append log lines to this file
  -h, --help                 Print help
  -V, --version              Print version

Environment:
  DIGIT_INGEST_PORT, DIGIT_INGEST_DATA_DIR, DIGIT_INGEST_LOG_LEVEL
";

/// Everything the server needs to start
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Root of `user_ids.txt` and `images/`
    pub data_dir: PathBuf,
    pub limits: RequestLimits,
    /// Time allowed to receive one complete request
    pub read_timeout: Duration,
    pub log_level: LevelFilter,
    pub log_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8000,
            data_dir: PathBuf::from("."),
            limits: RequestLimits::default(),
            read_timeout: Duration::from_secs(10),
            log_level: LevelFilter::Info,
            log_file: None,
        }
    }
}

/// What the command line asked for
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Serve(ServerConfig),
    Help,
    Version,
}

impl ServerConfig {
    /// `host:port` suitable for binding, bracketing IPv6 literals
    pub fn listen_address(&self) -> String {
        if self.bind_address.contains(':') && !self.bind_address.starts_with('[') {
            format!("[{}]:{}", self.bind_address, self.port)
        } else {
            format!("{}:{}", self.bind_address, self.port)
        }
    }

    /// Apply `DIGIT_INGEST_*` variables from the process environment
    ///
    /// # Returns
    /// * `Vec<String>` - Warnings for variables that were set but invalid
    pub fn apply_env(&mut self) -> Vec<String> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides read through `lookup`
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Vec<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut warnings = Vec::new();

        if let Some(port) = lookup(ENV_PORT) {
            match port.trim().parse() {
                Ok(port) => self.port = port,
                Err(e) => warnings.push(format!("Invalid {} value '{}': {}, using {}", ENV_PORT, port, e, self.port)),
            }
        }

        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|dir| !dir.is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }

        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            match parse_level(&level) {
                Ok(level) => self.log_level = level,
                Err(e) => warnings.push(format!("Invalid {} value: {}, using {}", ENV_LOG_LEVEL, e, self.log_level)),
            }
        }

        warnings
    }
}

/// Parse command line flags on top of `config`
///
/// # Arguments
/// * `config` - Configuration after defaults and environment
/// * `parser` - `lexopt::Parser::from_env()` in the binary
///
/// # Returns
/// * `Result<Command, lexopt::Error>` - The command, or a usage error
pub fn parse_args(mut config: ServerConfig, mut parser: lexopt::Parser) -> Result<Command, lexopt::Error> {
    while let Some(arg) = parser.next()? {
        match arg {
            Short('p') | Long("port") => config.port = parser.value()?.parse()?,
            Short('b') | Long("bind") => config.bind_address = parser.value()?.string()?,
            Short('d') | Long("data-dir") => config.data_dir = PathBuf::from(parser.value()?),
            Long("max-body") => config.limits.max_body_bytes = parser.value()?.parse()?,
            Long("read-timeout") => {
                let secs: u64 = parser.value()?.parse()?;
                if secs == 0 {
                    return Err("read timeout must be at least one second".into());
                }
                config.read_timeout = Duration::from_secs(secs);
            }
            Long("log-level") => config.log_level = parse_level(&parser.value()?.string()?)?,
            Long("log-file") => config.log_file = Some(PathBuf::from(parser.value()?)),
            Short('h') | Long("help") => return Ok(Command::Help),
            Short('V') | Long("version") => return Ok(Command::Version),
            _ => return Err(arg.unexpected()),
        }
    }

    Ok(Command::Serve(config))
}

fn parse_level(level: &str) -> Result<LevelFilter, String> {
    LevelFilter::from_str(level.trim()).map_err(|_| format!("unknown log level '{}'", level))
}
