//! Configuration loading and validation (§6.4).
//!
//! The wire surface here is plain `serde` + `toml`, the way the rest of the
//! daemon's ambient stack leans on the same crates it uses for everything
//! else rather than a hand-rolled parser.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration:\n{}", .0.join("\n"))]
    Invalid(Vec<String>),
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub description: String,
    pub sid: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TlsConfig {
    pub port: u16,
    pub cert_path: String,
    pub key_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    pub port: u16,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    pub max_clients: usize,
    pub ping_interval: u64,
    pub idle_timeout: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_clients: 1000,
            ping_interval: 90,
            idle_timeout: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperBlock {
    pub name: String,
    pub bcrypt_hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinkBlock {
    pub name: String,
    pub sid: String,
    pub host: String,
    pub port: u16,
    pub password: String,
    #[serde(default)]
    pub auto_connect: bool,
    #[serde(default)]
    pub is_hub: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FederationConfig {
    pub link_password: String,
    pub link_port: u16,
    #[serde(default)]
    pub links: Vec<LinkBlock>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub listen: ListenConfig,
    pub tls: Option<TlsConfig>,
    pub websocket: Option<WebSocketConfig>,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub oper: Vec<OperBlock>,
    pub federation: Option<FederationConfig>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Collects every problem found rather than stopping at the first, so an
    /// operator fixing a config file sees the whole list in one pass.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if !crate::sync::proto::validate_sid(&self.server.sid) {
            errors.push(format!("server.sid {:?} is not a valid TS6 SID", self.server.sid));
        }
        if self.server.name.is_empty() {
            errors.push("server.name must not be empty".to_string());
        }

        if let Some(fed) = &self.federation {
            let mut seen_sids = HashSet::new();
            seen_sids.insert(self.server.sid.clone());
            for link in &fed.links {
                if !crate::sync::proto::validate_sid(&link.sid) {
                    errors.push(format!("federation.links[{}].sid {:?} is not a valid TS6 SID", link.name, link.sid));
                }
                if !seen_sids.insert(link.sid.clone()) {
                    errors.push(format!("federation.links[{}].sid {:?} collides with another configured SID", link.name, link.sid));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            server: ServerConfig {
                name: "irc.example.com".to_string(),
                description: "test server".to_string(),
                sid: "1AA".to_string(),
                log_format: LogFormat::Pretty,
            },
            listen: ListenConfig {
                host: "0.0.0.0".to_string(),
                port: 6667,
            },
            tls: None,
            websocket: None,
            limits: LimitsConfig::default(),
            oper: vec![],
            federation: None,
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn bad_sid_is_rejected() {
        let mut c = base_config();
        c.server.sid = "toolong".to_string();
        assert!(c.validate().is_err());
    }

    #[test]
    fn colliding_link_sid_is_rejected() {
        let mut c = base_config();
        c.federation = Some(FederationConfig {
            link_password: "sekrit".to_string(),
            link_port: 7000,
            links: vec![LinkBlock {
                name: "leaf".to_string(),
                sid: "1AA".to_string(),
                host: "leaf.example.com".to_string(),
                port: 6667,
                password: "sekrit".to_string(),
                auto_connect: false,
                is_hub: false,
            }],
        });
        assert!(c.validate().is_err());
    }
}
