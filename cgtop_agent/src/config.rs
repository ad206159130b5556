//! Agent configuration: command-line flags layered over environment variables
//! layered over defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::scanner::ScanMode;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_TLS_PORT: u16 = 8443;
pub const DEFAULT_ROOT: &str = "/sys/fs/cgroup";
pub const DEFAULT_NET_DEV: &str = "/proc/net/dev";
pub const DEFAULT_TICK_MS: u64 = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub bind: String,
    pub port: u16,
    pub root: PathBuf,
    pub net_dev: PathBuf,
    pub tick: Duration,
    pub scan_mode: ScanMode,
    pub static_dir: Option<PathBuf>,
    pub tls: bool,
    /// Close a session after this long without an inbound frame.
    pub idle_timeout: Option<Duration>,
    /// Close a session whose outbound frame cannot be written within this long.
    pub send_timeout: Duration,
    pub max_clients: usize,
    pub prune_deltas: bool,
    pub pause_when_idle: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            root: PathBuf::from(DEFAULT_ROOT),
            net_dev: PathBuf::from(DEFAULT_NET_DEV),
            tick: Duration::from_millis(DEFAULT_TICK_MS),
            scan_mode: ScanMode::Full,
            static_dir: None,
            tls: false,
            idle_timeout: None,
            send_timeout: Duration::from_millis(5_000),
            max_clients: 256,
            prune_deltas: true,
            pause_when_idle: true,
        }
    }
}

pub enum Parsed {
    Run(AgentConfig),
    Help(String),
}

pub fn usage(prog: &str) -> String {
    format!(
        "Usage: {prog} [--port N|-p N] [--bind ADDR|-b ADDR] [--root DIR|-r DIR] [--net-dev FILE] \
         [--tick-ms N] [--scan-mode full|level] [--static-dir DIR] [--enableSSL] \
         [--idle-timeout-secs N] [--send-timeout-ms N] [--max-clients N]"
    )
}

fn parse_num<T: std::str::FromStr>(flag: &str, v: Option<String>) -> Result<T, String> {
    let v = v.ok_or_else(|| format!("{flag} needs a value"))?;
    v.trim()
        .parse::<T>()
        .map_err(|_| format!("invalid value for {flag}: '{v}'"))
}

fn env_flag(v: &str) -> bool {
    !matches!(v.trim(), "0" | "false" | "no" | "off" | "")
}

/// Parse `args` (program name first). `env` looks up environment variables;
/// explicit flags win over it.
pub fn parse_args<I, E>(args: I, env: E) -> Result<Parsed, String>
where
    I: IntoIterator<Item = String>,
    E: Fn(&str) -> Option<String>,
{
    let mut it = args.into_iter();
    let prog = it.next().unwrap_or_else(|| "cgtop_agent".into());
    let mut cfg = AgentConfig::default();
    let mut port: Option<u16> = None;

    // Environment first; flags below override.
    if let Some(v) = env("CGTOP_AGENT_PORT") {
        port = Some(parse_num("CGTOP_AGENT_PORT", Some(v))?);
    }
    if let Some(v) = env("CGTOP_AGENT_BIND") {
        cfg.bind = v;
    }
    if let Some(v) = env("CGTOP_AGENT_ROOT") {
        cfg.root = PathBuf::from(v);
    }
    if let Some(v) = env("CGTOP_AGENT_NET_DEV") {
        cfg.net_dev = PathBuf::from(v);
    }
    if let Some(v) = env("CGTOP_AGENT_TICK_MS") {
        cfg.tick = Duration::from_millis(parse_num("CGTOP_AGENT_TICK_MS", Some(v))?);
    }
    if let Some(v) = env("CGTOP_AGENT_SCAN_MODE") {
        cfg.scan_mode = v.parse()?;
    }
    if let Some(v) = env("CGTOP_AGENT_STATIC_DIR") {
        cfg.static_dir = Some(PathBuf::from(v));
    }
    if let Some(v) = env("CGTOP_ENABLE_SSL") {
        cfg.tls = env_flag(&v);
    }
    if let Some(v) = env("CGTOP_AGENT_IDLE_TIMEOUT_SECS") {
        let secs: u64 = parse_num("CGTOP_AGENT_IDLE_TIMEOUT_SECS", Some(v))?;
        cfg.idle_timeout = (secs > 0).then(|| Duration::from_secs(secs));
    }
    if let Some(v) = env("CGTOP_AGENT_SEND_TIMEOUT_MS") {
        cfg.send_timeout = Duration::from_millis(parse_num("CGTOP_AGENT_SEND_TIMEOUT_MS", Some(v))?);
    }
    if let Some(v) = env("CGTOP_AGENT_MAX_CLIENTS") {
        cfg.max_clients = parse_num("CGTOP_AGENT_MAX_CLIENTS", Some(v))?;
    }
    if let Some(v) = env("CGTOP_AGENT_PRUNE") {
        cfg.prune_deltas = env_flag(&v);
    }
    if let Some(v) = env("CGTOP_AGENT_PAUSE_IDLE") {
        cfg.pause_when_idle = env_flag(&v);
    }

    while let Some(arg) = it.next() {
        // Accept both `--flag value` and `--flag=value`.
        let (flag, inline) = match arg.split_once('=') {
            Some((f, v)) if f.starts_with("--") => (f.to_string(), Some(v.to_string())),
            _ => (arg.clone(), None),
        };
        let mut value = || inline.clone().or_else(|| it.next());
        match flag.as_str() {
            "-h" | "--help" => return Ok(Parsed::Help(usage(&prog))),
            "--port" | "-p" => port = Some(parse_num("--port", value())?),
            "--bind" | "-b" => cfg.bind = value().ok_or("--bind needs a value")?,
            "--root" | "-r" => cfg.root = PathBuf::from(value().ok_or("--root needs a value")?),
            "--net-dev" => cfg.net_dev = PathBuf::from(value().ok_or("--net-dev needs a value")?),
            "--tick-ms" => cfg.tick = Duration::from_millis(parse_num("--tick-ms", value())?),
            "--scan-mode" => cfg.scan_mode = value().ok_or("--scan-mode needs a value")?.parse()?,
            "--static-dir" => {
                cfg.static_dir = Some(PathBuf::from(value().ok_or("--static-dir needs a value")?))
            }
            "--enableSSL" => cfg.tls = true,
            "--idle-timeout-secs" => {
                let secs: u64 = parse_num("--idle-timeout-secs", value())?;
                cfg.idle_timeout = (secs > 0).then(|| Duration::from_secs(secs));
            }
            "--send-timeout-ms" => {
                cfg.send_timeout = Duration::from_millis(parse_num("--send-timeout-ms", value())?)
            }
            "--max-clients" => cfg.max_clients = parse_num("--max-clients", value())?,
            other => return Err(format!("unexpected argument '{other}'\n{}", usage(&prog))),
        }
    }

    if cfg.tick.is_zero() {
        return Err("tick must be greater than zero".into());
    }
    if cfg.send_timeout.is_zero() {
        return Err("send timeout must be greater than zero".into());
    }
    cfg.port = port.unwrap_or(if cfg.tls { DEFAULT_TLS_PORT } else { DEFAULT_PORT });
    if let Ok(canonical) = std::fs::canonicalize(&cfg.root) {
        cfg.root = canonical;
    }
    Ok(Parsed::Run(cfg))
}
