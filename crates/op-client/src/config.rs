//! Client configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (OP_HOST, OP_PORT)
//! - TOML configuration file
//!
//! [`SessionConfig`] alone is enough to drive a [`crate::Client`]; the rest
//! configures the `opmon` monitor.

use anyhow::{ensure, Context, Result};
use op_core::Topic;
use op_transport::TcpDialerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Controller host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Controller port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Session behaviour.
    #[serde(default)]
    pub session: SessionConfig,

    /// Keep-alive configuration.
    #[serde(default)]
    pub keep_alive: KeepAliveConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Topics to subscribe to after communication starts.
    #[serde(default = "default_subscriptions")]
    pub subscriptions: Vec<Topic>,

    /// Request PowerMACS bolt data when acknowledging station results.
    #[serde(default)]
    pub powermacs_bolt_data: bool,
}

/// Session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Deadline for a command response in milliseconds.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_ms: u64,

    /// Deadline for resolving and connecting in milliseconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Outbound requests queued before callers wait.
    #[serde(default = "default_request_queue_capacity")]
    pub request_queue_capacity: usize,

    /// Close the session on a telegram shorter than the header.
    #[serde(default = "default_true")]
    pub strict_framing: bool,

    /// Largest telegram accepted from the controller.
    #[serde(default = "default_max_telegram_size")]
    pub max_telegram_size: usize,

    /// Enable TCP keep-alive.
    #[serde(default = "default_true")]
    pub tcp_keepalive: bool,
}

/// Keep-alive configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeepAliveConfig {
    /// Send MID 9999 periodically.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Keep-alive interval in milliseconds.
    #[serde(default = "default_keep_alive_interval")]
    pub interval_ms: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable the Prometheus exporter.
    #[serde(default)]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_host() -> String {
    std::env::var("OP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string())
}

fn default_port() -> u16 {
    std::env::var("OP_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(4545)
}

fn default_true() -> bool {
    true
}

fn default_subscriptions() -> Vec<Topic> {
    vec![Topic::LastTighteningResult]
}

fn default_command_timeout() -> u64 {
    10_000 // 10 seconds
}

fn default_connect_timeout() -> u64 {
    5_000
}

fn default_request_queue_capacity() -> usize {
    64
}

fn default_max_telegram_size() -> usize {
    op_protocol::codec::MAX_TELEGRAM_SIZE
}

fn default_keep_alive_interval() -> u64 {
    10_000
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            session: SessionConfig::default(),
            keep_alive: KeepAliveConfig::default(),
            metrics: MetricsConfig::default(),
            subscriptions: default_subscriptions(),
            powermacs_bolt_data: false,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: default_command_timeout(),
            connect_timeout_ms: default_connect_timeout(),
            request_queue_capacity: default_request_queue_capacity(),
            strict_framing: true,
            max_telegram_size: default_max_telegram_size(),
            tcp_keepalive: true,
        }
    }
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: default_keep_alive_interval(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl SessionConfig {
    /// Command response deadline.
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Connect deadline.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// TCP dialer settings for `host:port` under this session's limits.
    #[must_use]
    pub fn tcp_dialer(&self, host: impl Into<String>, port: u16) -> TcpDialerConfig {
        TcpDialerConfig {
            host: host.into(),
            port,
            connect_timeout: self.connect_timeout(),
            keepalive: self.tcp_keepalive,
            max_telegram_size: self.max_telegram_size,
        }
    }
}

impl KeepAliveConfig {
    /// Keep-alive period.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Config {
    /// Load configuration from file or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed, or
    /// if the resulting configuration is invalid.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "opmon.toml",
            "/etc/opmon/opmon.toml",
            "~/.config/opmon/opmon.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults with environment overrides
        let config = Self::default();
        config.validate().context("Invalid default configuration")?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Check values serde accepts but the client cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending setting.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.session.command_timeout_ms > 0,
            "session.command_timeout_ms must be greater than zero"
        );
        ensure!(
            self.session.connect_timeout_ms > 0,
            "session.connect_timeout_ms must be greater than zero"
        );
        ensure!(
            (op_protocol::codec::HEADER_LEN..=op_protocol::codec::MAX_TELEGRAM_SIZE)
                .contains(&self.session.max_telegram_size),
            "session.max_telegram_size must be between {} and {}",
            op_protocol::codec::HEADER_LEN,
            op_protocol::codec::MAX_TELEGRAM_SIZE
        );
        ensure!(
            !self.keep_alive.enabled || self.keep_alive.interval_ms > 0,
            "keep_alive.interval_ms must be greater than zero"
        );
        Ok(())
    }

    /// TCP dialer settings for the configured controller.
    #[must_use]
    pub fn dialer_config(&self) -> TcpDialerConfig {
        self.session.tcp_dialer(self.host.as_str(), self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_session_config() {
        let session = SessionConfig::default();
        assert_eq!(session.command_timeout(), Duration::from_secs(10));
        assert!(session.strict_framing);
        assert!(session.tcp_keepalive);
        assert_eq!(session.max_telegram_size, 9999);
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            host = "10.0.0.7"
            port = 4546
            subscriptions = ["last_tightening_result", "power_macs_result"]
            powermacs_bolt_data = true

            [session]
            command_timeout_ms = 2500
            strict_framing = false

            [keep_alive]
            interval_ms = 15000
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.host, "10.0.0.7");
        assert_eq!(config.port, 4546);
        assert_eq!(
            config.subscriptions,
            vec![Topic::LastTighteningResult, Topic::PowerMacsResult]
        );
        assert!(config.powermacs_bolt_data);
        assert_eq!(config.session.command_timeout(), Duration::from_millis(2500));
        assert!(!config.session.strict_framing);
        assert_eq!(config.session.request_queue_capacity, 64);
        assert!(config.keep_alive.enabled);
        assert_eq!(config.keep_alive.interval(), Duration::from_secs(15));
        assert!(!config.metrics.enabled);

        let dialer = config.dialer_config();
        assert_eq!(dialer.port, 4546);
        assert!(dialer.keepalive);
    }

    #[test]
    fn test_unknown_topic_rejected() {
        let toml_str = r#"subscriptions = ["torque"]"#;
        assert!(toml::from_str::<Config>(toml_str).is_err());
    }

    fn write_config(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("opmon-{}-{name}.toml", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_zero_keep_alive_interval_rejected() {
        let path = write_config("keep-alive", "[keep_alive]\ninterval_ms = 0\n");
        let err = Config::from_file(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();

        assert!(err.to_string().contains("Invalid config file"));
        assert!(format!("{err:#}").contains("keep_alive.interval_ms"));
    }

    #[test]
    fn test_zero_interval_allowed_when_keep_alive_disabled() {
        let toml_str = "[keep_alive]\nenabled = false\ninterval_ms = 0\n";
        let config: Config = toml::from_str(toml_str).unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn test_zero_command_timeout_rejected() {
        let path = write_config("command-timeout", "[session]\ncommand_timeout_ms = 0\n");
        let err = Config::from_file(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();

        assert!(err.to_string().contains("Invalid config file"));
        assert!(format!("{err:#}").contains("session.command_timeout_ms"));
    }

    #[test]
    fn test_zero_connect_timeout_rejected() {
        let config: Config = toml::from_str("[session]\nconnect_timeout_ms = 0\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("session.connect_timeout_ms"));
    }

    #[test]
    fn test_telegram_size_below_header_rejected() {
        let config: Config = toml::from_str("[session]\nmax_telegram_size = 10\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("session.max_telegram_size"));
    }

    #[test]
    fn test_from_missing_file() {
        let err = Config::from_file("/nonexistent/opmon.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
