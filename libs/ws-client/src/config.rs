use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3030;

/// Схема транспорта.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Ws,
    Wss,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Ws => "ws",
            Scheme::Wss => "wss",
        }
    }
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════
//  EndpointConfig
// ═══════════════════════════════════════════════════════════════

/// Куда подключаться: `scheme://address:port[/path]`.
///
/// Меняется только пока manager не подключён; проверяется при `connect()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub scheme: Scheme,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            path: String::new(),
            scheme: Scheme::Ws,
        }
    }
}

impl EndpointConfig {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Целевой адрес как строка, без проверки.
    ///
    /// Один ведущий `/` у path срезается, сам path добавляется через
    /// ровно один `/`. IPv6-литерал заворачивается в скобки.
    pub fn url_string(&self) -> String {
        let host = self.address.trim();
        let host = if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]")
        } else {
            host.to_string()
        };

        let mut url = format!("{}://{}:{}", self.scheme, host, self.port);
        if !self.path.is_empty() {
            let path = self.path.strip_prefix('/').unwrap_or(&self.path);
            url.push('/');
            url.push_str(path);
        }
        url
    }

    /// Проверенный URL для транспорта.
    pub fn url(&self) -> Result<Url, ConfigError> {
        let address = self.address.trim();
        if address.is_empty() {
            return Err(ConfigError::EmptyAddress);
        }
        if address
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '@'))
        {
            return Err(ConfigError::InvalidAddress(self.address.clone()));
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        let raw = self.url_string();
        let url = Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })?;
        if url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl {
                url: raw,
                reason: "no host".into(),
            });
        }
        Ok(url)
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
