use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

const DEFAULT_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";
const ERP_API_KEY_ENV: &str = "WAREHOUSE_ERP_API_KEY";

/// Top-level configuration, loadable from a TOML file. Every field has a
/// default so an empty file is valid.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub erp: ErpConfig,
    pub auth: AuthConfig,
    pub executor: ExecutorConfig,
}

impl Config {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&raw)?;
        config.apply_env();
        Ok(config)
    }

    /// Applies overrides read from the process environment.
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(ERP_API_KEY_ENV) {
            if !key.is_empty() {
                self.erp.api_key = Some(key);
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("warehouse.db")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
        }
    }
}

/// Where pipeline runs pull their rows from.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ErpConfig {
    /// Base URL of the ERP export API. Pulls fail while unset.
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ErpConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    /// Ask the identity provider's UserInfo endpoint who the token belongs to.
    #[default]
    Userinfo,
    /// Read `sub` from the JWT payload without checking the signature.
    /// Only for deployments where a gateway has already verified the token.
    JwtClaims,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub userinfo_url: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::default(),
            userinfo_url: DEFAULT_USERINFO_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Pipeline runs allowed to pull at the same time; the rest wait.
    pub max_concurrent_runs: usize,
    /// How long shutdown waits for in-flight runs.
    pub shutdown_grace_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 8,
            shutdown_grace_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.mode, AuthMode::Userinfo);
        assert_eq!(config.executor.max_concurrent_runs, 8);
        assert!(config.erp.base_url.is_none());
        assert_eq!(config.server.db_path(), PathBuf::from("./data/warehouse.db"));
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_toml_str(
            r#"
            [server]
            port = 9000

            [erp]
            base_url = "http://erp.internal"
            timeout_secs = 5

            [auth]
            mode = "jwt-claims"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.erp.base_url.as_deref(), Some("http://erp.internal"));
        assert_eq!(config.erp.timeout_secs, 5);
        assert_eq!(config.auth.mode, AuthMode::JwtClaims);
        assert_eq!(config.auth.userinfo_url, DEFAULT_USERINFO_URL);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = Config::from_toml_str("[server]\nport = \"eighty\"");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_socket_addr() {
        let config = ServerConfig::default();
        assert_eq!(config.socket_addr().unwrap().port(), 8080);
    }
}
