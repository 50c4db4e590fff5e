//! Agent configuration from command-line flags and `SYSDASH_*` variables.
//! Flags win over the environment, the environment over defaults.

use crate::actions::ActionPolicy;
use crate::metrics::DEFAULT_CPU_INTERVAL;
use crate::processes::DEFAULT_LIMIT;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub bind: IpAddr,
    pub port: u16,
    /// Used when `/api/processes` is called without `limit`.
    pub process_limit: usize,
    pub cpu_interval: Duration,
    pub actions: ActionPolicy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            process_limit: DEFAULT_LIMIT,
            cpu_interval: DEFAULT_CPU_INTERVAL,
            actions: ActionPolicy::default(),
        }
    }
}

impl AgentConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: String, value: String },
    #[error("{0} needs a value")]
    MissingValue(String),
    #[error("unexpected argument {0:?}")]
    Unexpected(String),
}

#[derive(Debug, PartialEq)]
pub enum Parsed {
    Run(AgentConfig),
    Help(String),
}

pub fn usage(prog: &str) -> String {
    format!(
        "Usage: {prog} [--port PORT|-p PORT] [--bind ADDR] [--limit N] [--allow-user-kill] [--no-host-actions]\n\
         Environment: SYSDASH_PORT, SYSDASH_BIND, SYSDASH_PROCESS_LIMIT, SYSDASH_CPU_INTERVAL_MS,\n\
         \x20            SYSDASH_ALLOW_USER_KILL, SYSDASH_HOST_ACTIONS, SYSDASH_TEMP"
    )
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn flag_on(v: &str) -> bool {
    !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off" | "")
}

fn apply_env(cfg: &mut AgentConfig, env: &impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
    if let Some(v) = env("SYSDASH_PORT") {
        cfg.port = parse_value("SYSDASH_PORT", &v)?;
    }
    if let Some(v) = env("SYSDASH_BIND") {
        cfg.bind = parse_value("SYSDASH_BIND", &v)?;
    }
    if let Some(v) = env("SYSDASH_PROCESS_LIMIT") {
        cfg.process_limit = parse_value("SYSDASH_PROCESS_LIMIT", &v)?;
    }
    if let Some(v) = env("SYSDASH_CPU_INTERVAL_MS") {
        let ms: u64 = parse_value("SYSDASH_CPU_INTERVAL_MS", &v)?;
        cfg.cpu_interval = Duration::from_millis(ms);
    }
    if let Some(v) = env("SYSDASH_ALLOW_USER_KILL") {
        cfg.actions.allow_user_kill = flag_on(&v);
    }
    if let Some(v) = env("SYSDASH_HOST_ACTIONS") {
        cfg.actions.enabled = flag_on(&v);
    }
    Ok(())
}

/// Parse `args` (program name first) on top of the environment seen through `env`.
pub fn parse_args<I, E>(args: I, env: E) -> Result<Parsed, ConfigError>
where
    I: IntoIterator<Item = String>,
    E: Fn(&str) -> Option<String>,
{
    let mut it = args.into_iter();
    let prog = it.next().unwrap_or_else(|| "sysdash_agent".into());
    let mut cfg = AgentConfig::default();
    apply_env(&mut cfg, &env)?;

    while let Some(arg) = it.next() {
        let (key, inline) = match arg.split_once('=') {
            Some((k, v)) if k.starts_with("--") => (k.to_string(), Some(v.to_string())),
            _ => (arg.clone(), None),
        };
        let mut value = |name: &str| -> Result<String, ConfigError> {
            inline
                .clone()
                .or_else(|| it.next())
                .ok_or_else(|| ConfigError::MissingValue(name.to_string()))
        };
        match key.as_str() {
            "-h" | "--help" => return Ok(Parsed::Help(usage(&prog))),
            "--port" | "-p" => cfg.port = parse_value(&key, &value(&key)?)?,
            "--bind" => cfg.bind = parse_value(&key, &value(&key)?)?,
            "--limit" => cfg.process_limit = parse_value(&key, &value(&key)?)?,
            "--allow-user-kill" => cfg.actions.allow_user_kill = true,
            "--no-host-actions" => cfg.actions.enabled = false,
            _ => return Err(ConfigError::Unexpected(arg)),
        }
    }
    Ok(Parsed::Run(cfg))
}

/// Parse the real process arguments and environment.
pub fn from_env() -> Result<Parsed, ConfigError> {
    parse_args(std::env::args(), |k| std::env::var(k).ok())
}
