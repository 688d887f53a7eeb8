use clap::{Args, ValueEnum};
use serde::Deserialize;

use super::error::FeedGenError;

/// Формат frame'ов на проводе.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// Text frame `{"NewDatapoint": {topic, time, data_json}}`
    #[default]
    Json,
    /// Binary frame: Arrow IPC file с плоскими колонками
    Arrow,
}

impl std::fmt::Display for WireFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireFormat::Json => f.write_str("json"),
            WireFormat::Arrow => f.write_str("arrow"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
    pub rate_hz: Option<f64>,
    pub format: Option<WireFormat>,
    pub topic: Option<String>,
}

pub fn load_config(path: &str) -> Result<Config, FeedGenError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| FeedGenError::Config(format!("cannot read config {path}: {e}")))?;
    toml::from_str(&content).map_err(|e| FeedGenError::Config(format!("bad config {path}: {e}")))
}

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Args, Clone, Debug)]
pub struct FeedArgs {
    /// Путь к feed-gen.toml
    #[arg(long, default_value = "feed-gen.toml", env = "FEED_GEN_CONFIG")]
    pub config: String,

    /// Адрес для bind (по умолчанию 0.0.0.0)
    #[arg(long)]
    pub bind: Option<String>,

    /// Порт WebSocket (по умолчанию 3030)
    #[arg(long)]
    pub port: Option<u16>,

    /// Путь WebSocket endpoint'а (по умолчанию "spam")
    #[arg(long)]
    pub path: Option<String>,

    /// Сообщений в секунду на соединение
    #[arg(long)]
    pub rate_hz: Option<f64>,

    /// Формат frame'ов
    #[arg(long, value_enum)]
    pub format: Option<WireFormat>,

    /// Topic отправляемых записей
    #[arg(long)]
    pub topic: Option<String>,
}

// ═══════════════════════════════════════════════════════════════
//  Effective — merged config
// ═══════════════════════════════════════════════════════════════

/// Итоговая конфигурация: defaults < feed-gen.toml < CLI.
#[derive(Debug, Clone)]
pub struct Effective {
    pub bind: String,
    pub port: u16,
    pub path: String,
    pub rate_hz: f64,
    pub format: WireFormat,
    pub topic: String,
}

impl Effective {
    pub fn new(args: &FeedArgs) -> Result<Self, FeedGenError> {
        let cfg = match load_config(&args.config) {
            Ok(c) => c,
            Err(e) => {
                if std::path::Path::new(&args.config).exists() {
                    return Err(e);
                }
                Config::default()
            }
        };
        Self::merge(args, cfg)
    }

    pub fn merge(args: &FeedArgs, cfg: Config) -> Result<Self, FeedGenError> {
        let rate_hz = args.rate_hz.or(cfg.rate_hz).unwrap_or(10.0);
        if !rate_hz.is_finite() || rate_hz <= 0.0 {
            return Err(FeedGenError::Config(format!("rate_hz must be positive, got {rate_hz}")));
        }

        let topic = args.topic.clone().or(cfg.topic).unwrap_or_else(|| "test/topic".into());
        if topic.is_empty() {
            return Err(FeedGenError::Config("topic must not be empty".into()));
        }

        Ok(Self {
            bind: args.bind.clone().or(cfg.bind).unwrap_or_else(|| "0.0.0.0".into()),
            port: args.port.or(cfg.port).unwrap_or(3030),
            path: args.path.clone().or(cfg.path).unwrap_or_else(|| "spam".into()),
            rate_hz,
            format: args.format.or(cfg.format).unwrap_or_default(),
            topic,
        })
    }

    /// Маршрут axum: `/` + path без ведущего `/`.
    pub fn route(&self) -> String {
        format!("/{}", self.path.trim_start_matches('/'))
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
