//! Configuration management for remoteview-core

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::input::InputConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Signaling connection
    pub signaling: SignalingConfig,

    /// ICE servers for peer negotiation
    #[serde(default)]
    pub ice: IceConfig,

    /// Heartbeat and reconnect policy
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    /// Input capture tunables
    #[serde(default)]
    pub input: InputConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalingConfig {
    /// Signaling server URL (ws:// or wss://)
    pub url: String,

    /// Client tag announced on login
    #[serde(default = "default_client_tag")]
    pub client_tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceConfig {
    #[serde(default = "default_ice_servers")]
    pub servers: Vec<IceServerConfig>,
}

impl Default for IceConfig {
    fn default() -> Self {
        Self {
            servers: default_ice_servers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub credential: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Ping period in milliseconds
    #[serde(default = "default_heartbeat_interval_ms")]
    pub interval_ms: u64,

    /// Silence window before the session is declared dead
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub timeout_ms: u64,

    /// Delay before the full session restart
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_heartbeat_interval_ms(),
            timeout_ms: default_heartbeat_timeout_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Verbose per-message transport logging
    #[serde(default)]
    pub log_actions: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_actions: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            signaling: SignalingConfig {
                url: "wss://127.0.0.1:9090".to_string(),
                client_tag: default_client_tag(),
            },
            ice: IceConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            input: InputConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file; a missing file yields the
    /// defaults.
    pub fn load(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if !self.signaling.url.starts_with("ws://") && !self.signaling.url.starts_with("wss://") {
            return Err("Signaling URL must be a ws:// or wss:// URL".into());
        }

        if self.heartbeat.interval_ms == 0 {
            return Err("Heartbeat interval must be non-zero".into());
        }
        if self.heartbeat.timeout_ms <= self.heartbeat.interval_ms {
            return Err("Heartbeat timeout must exceed the interval".into());
        }

        if self.input.gesture_sensitivity <= 0.0 {
            return Err("Gesture sensitivity must be positive".into());
        }
        if self.input.virtual_wheel_interval_ms == 0 {
            return Err("Virtual wheel interval must be non-zero".into());
        }

        for server in &self.ice.servers {
            if server.urls.is_empty() {
                return Err("ICE server entry has no URLs".into());
            }
        }

        Ok(())
    }
}

fn default_client_tag() -> String {
    "web".to_string()
}

fn default_ice_servers() -> Vec<IceServerConfig> {
    vec![IceServerConfig {
        urls: vec!["stun:stun.l.google.com:19302".to_string()],
        username: None,
        credential: None,
    }]
}

fn default_heartbeat_interval_ms() -> u64 {
    3000
}

fn default_heartbeat_timeout_ms() -> u64 {
    10_000
}

fn default_reconnect_delay_ms() -> u64 {
    2000
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn defaults_validate() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_signaling_url() {
        let mut cfg = Config::default();
        cfg.signaling.url = "http://example.invalid".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_timeout_below_interval() {
        let mut cfg = Config::default();
        cfg.heartbeat.timeout_ms = cfg.heartbeat.interval_ms;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [signaling]
            url = "wss://relay.example.net:9090"

            [heartbeat]
            interval_ms = 5000
            timeout_ms = 15000
            "#,
        )
        .unwrap();
        assert_eq!(cfg.signaling.client_tag, "web");
        assert_eq!(cfg.heartbeat.interval_ms, 5000);
        assert_eq!(cfg.heartbeat.reconnect_delay_ms, 2000);
        assert_eq!(cfg.input.gesture_sensitivity, 2.0);
        assert!(!cfg.ice.servers.is_empty());
    }
}
