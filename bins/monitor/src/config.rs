use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use ws_client::{DEFAULT_ADDRESS, DEFAULT_PORT, EndpointConfig, Scheme};

use crate::error::MonitorError;

#[derive(Parser)]
#[command(name = "telemetry-monitor", about = "Наблюдение за живым потоком телеметрии")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Подключиться к источнику и логировать поток
    Watch(WatchArgs),
}

#[derive(Args, Clone, Debug)]
pub struct WatchArgs {
    /// Путь к TOML конфиг файлу
    #[arg(long, default_value = "monitor.toml", env = "MONITOR_CONFIG")]
    pub config: String,

    /// Адрес источника
    #[arg(long, env = "MONITOR_ADDRESS")]
    pub address: Option<String>,

    /// Порт источника
    #[arg(long, env = "MONITOR_PORT")]
    pub port: Option<u16>,

    /// Путь WebSocket endpoint'а
    #[arg(long)]
    pub path: Option<String>,

    /// wss:// вместо ws://
    #[arg(long)]
    pub secure: bool,

    /// Период сводки в мс
    #[arg(long)]
    pub summary_ms: Option<u64>,

    /// Логировать каждую запись
    #[arg(long)]
    pub print_records: bool,
}

// ---- TOML Config ----

#[derive(Debug, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    /// Период сводки (мс).
    #[serde(default = "default_summary_ms")]
    pub summary_ms: u64,
    #[serde(default)]
    pub print_records: bool,
}

fn default_address() -> String {
    DEFAULT_ADDRESS.into()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_summary_ms() -> u64 {
    1000
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            path: String::new(),
            secure: false,
            summary_ms: default_summary_ms(),
            print_records: false,
        }
    }
}

impl MonitorConfig {
    pub fn load(path: &str) -> Result<Self, MonitorError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MonitorError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        toml::from_str(&content)
            .map_err(|e| MonitorError::Config { context: "parse", detail: format!("'{path}': {e}") })
    }
}

// ---- Effective ----

/// Итог: defaults < monitor.toml < env/CLI.
#[derive(Debug, Clone)]
pub struct Effective {
    pub endpoint: EndpointConfig,
    pub summary: Duration,
    pub print_records: bool,
}

impl Effective {
    pub fn new(args: &WatchArgs) -> Result<Self, MonitorError> {
        let cfg = if std::path::Path::new(&args.config).exists() {
            MonitorConfig::load(&args.config)?
        } else {
            MonitorConfig::default()
        };
        Self::merge(args, cfg)
    }

    pub fn merge(args: &WatchArgs, cfg: MonitorConfig) -> Result<Self, MonitorError> {
        let summary_ms = args.summary_ms.unwrap_or(cfg.summary_ms);
        if summary_ms == 0 {
            return Err(MonitorError::Config { context: "summary_ms", detail: "must be > 0".into() });
        }

        let scheme = if args.secure || cfg.secure { Scheme::Wss } else { Scheme::Ws };
        let endpoint = EndpointConfig::new(args.address.clone().unwrap_or(cfg.address), args.port.unwrap_or(cfg.port))
            .with_path(args.path.clone().unwrap_or(cfg.path))
            .with_scheme(scheme);

        Ok(Self {
            endpoint,
            summary: Duration::from_millis(summary_ms),
            print_records: args.print_records || cfg.print_records,
        })
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
