//! Command-line configuration for the harness binaries.
//!
//! ```text
//! eip-harness  [PORT] [OPTIONS]     default 127.0.0.1:44818
//! slmp-harness [PORT] [OPTIONS]     default 0.0.0.0:8888
//! ```
//!
//! Parsing never exits the process; errors come back as [`ConfigError`] and
//! the binary decides what to print.

use crate::protocol::{enip, slmp};
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Longest accepted timeout, in seconds.
const MAX_TIMEOUT_SECS: f64 = 86_400.0;

/// Which protocol a binary serves. Supplies the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    EtherNetIp,
    Slmp,
}

impl Protocol {
    pub fn name(self) -> &'static str {
        match self {
            Protocol::EtherNetIp => "EtherNet/IP",
            Protocol::Slmp => "SLMP",
        }
    }

    pub fn binary_name(self) -> &'static str {
        match self {
            Protocol::EtherNetIp => "eip-harness",
            Protocol::Slmp => "slmp-harness",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Protocol::EtherNetIp => enip::DEFAULT_PORT,
            Protocol::Slmp => slmp::DEFAULT_PORT,
        }
    }

    pub fn default_host(self) -> Ipv4Addr {
        match self {
            Protocol::EtherNetIp => Ipv4Addr::LOCALHOST,
            Protocol::Slmp => Ipv4Addr::UNSPECIFIED,
        }
    }

    /// Accept/receive waits used when none are given on the command line.
    pub fn default_timeouts(self, lifecycle: Lifecycle) -> Timeouts {
        let secs = |accept, recv| Timeouts {
            accept: Duration::from_secs(accept),
            recv: Duration::from_secs(recv),
        };
        match (self, lifecycle) {
            (_, Lifecycle::Persistent) => secs(1, 1),
            (Protocol::EtherNetIp, Lifecycle::SingleShot) => secs(5, 1),
            (Protocol::Slmp, Lifecycle::SingleShot) => secs(5, 2),
        }
    }
}

/// Connection lifecycle policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    /// Serve one connection, then exit
    #[default]
    SingleShot,
    /// Go back to listening after each connection until shutdown
    Persistent,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifecycle::SingleShot => write!(f, "single-shot"),
            Lifecycle::Persistent => write!(f, "persistent"),
        }
    }
}

/// Bounds on the two blocking waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub accept: Duration,
    pub recv: Duration,
}

/// Everything a harness run needs.
#[derive(Debug, Clone, PartialEq)]
pub struct HarnessConfig {
    pub protocol: Protocol,
    pub host: Ipv4Addr,
    pub port: u16,
    pub lifecycle: Lifecycle,
    pub timeouts: Timeouts,
    /// A positional port that did not parse and was replaced by the default
    pub rejected_port: Option<String>,
}

impl HarnessConfig {
    pub fn new(protocol: Protocol) -> Self {
        let lifecycle = Lifecycle::default();
        Self {
            protocol,
            host: protocol.default_host(),
            port: protocol.default_port(),
            lifecycle,
            timeouts: protocol.default_timeouts(lifecycle),
            rejected_port: None,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum CliAction {
    Run(HarnessConfig),
    Help,
    Version,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} requires a value")]
    MissingValue(&'static str),

    #[error("invalid host address '{0}', expected an IPv4 address")]
    InvalidHost(String),

    #[error("invalid {option} '{value}', expected seconds in (0, 86400]")]
    InvalidTimeout { option: &'static str, value: String },

    #[error("unknown argument: {0}")]
    UnknownArgument(String),

    #[error("unexpected extra argument: {0}")]
    UnexpectedArgument(String),
}

/// Parses the arguments that follow the program name.
pub fn parse_args<I>(protocol: Protocol, args: I) -> Result<CliAction, ConfigError>
where
    I: IntoIterator<Item = String>,
{
    let mut config = HarnessConfig::new(protocol);
    let mut accept_timeout = None;
    let mut recv_timeout = None;
    let mut seen_port = false;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(CliAction::Help),
            "--version" | "-V" => return Ok(CliAction::Version),
            "--persistent" => config.lifecycle = Lifecycle::Persistent,
            "--single-shot" => config.lifecycle = Lifecycle::SingleShot,
            "--host" => {
                let value = args.next().ok_or(ConfigError::MissingValue("--host"))?;
                config.host = value
                    .parse()
                    .map_err(|_| ConfigError::InvalidHost(value.clone()))?;
            }
            "--accept-timeout" => {
                let value = args
                    .next()
                    .ok_or(ConfigError::MissingValue("--accept-timeout"))?;
                accept_timeout = Some(parse_timeout("--accept-timeout", &value)?);
            }
            "--recv-timeout" => {
                let value = args
                    .next()
                    .ok_or(ConfigError::MissingValue("--recv-timeout"))?;
                recv_timeout = Some(parse_timeout("--recv-timeout", &value)?);
            }
            other if other.starts_with('-') && other.len() > 1 => {
                return Err(ConfigError::UnknownArgument(arg));
            }
            _ if !seen_port => {
                seen_port = true;
                match arg.parse::<u16>() {
                    Ok(port) => config.port = port,
                    Err(_) => config.rejected_port = Some(arg),
                }
            }
            _ => return Err(ConfigError::UnexpectedArgument(arg)),
        }
    }

    let defaults = protocol.default_timeouts(config.lifecycle);
    config.timeouts = Timeouts {
        accept: accept_timeout.unwrap_or(defaults.accept),
        recv: recv_timeout.unwrap_or(defaults.recv),
    };

    Ok(CliAction::Run(config))
}

fn parse_timeout(option: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidTimeout {
        option,
        value: value.to_string(),
    };
    let secs: f64 = value.parse().map_err(|_| invalid())?;
    if !secs.is_finite() || secs <= 0.0 || secs > MAX_TIMEOUT_SECS {
        return Err(invalid());
    }
    Ok(Duration::from_secs_f64(secs))
}

/// Help text for `--help`.
pub fn usage(protocol: Protocol) -> String {
    let defaults = protocol.default_timeouts(Lifecycle::SingleShot);
    format!(
        r#"
{bin} - {name} network fuzzing harness

USAGE:
    {bin} [PORT] [OPTIONS]

ARGS:
    [PORT]                    Port to listen on (default: {port})

OPTIONS:
        --host <ADDR>             IPv4 address to bind (default: {host})
        --persistent              Return to listening after each connection
        --single-shot             Serve one connection, then exit (default)
        --accept-timeout <SECS>   Accept wait (default: {accept}s, 1s persistent)
        --recv-timeout <SECS>     Receive wait (default: {recv}s, 1s persistent)
    -V, --version                 Print version information
    -h, --help                    Print this help message

Logs go to stderr; set RUST_LOG to change the level (default: info).
"#,
        bin = protocol.binary_name(),
        name = protocol.name(),
        port = protocol.default_port(),
        host = protocol.default_host(),
        accept = defaults.accept.as_secs(),
        recv = defaults.recv.as_secs(),
    )
}
