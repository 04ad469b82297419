//! Application configuration loaded from environment variables.

use serde::Deserialize;
use url::Url;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Content Services ===
    /// Host serving `/services/content/subscribe` and `/unsubscribe`.
    #[serde(default = "default_subscribe_url")]
    pub subscribe_url: String,

    /// Language reported in the subscribe client context.
    #[serde(default = "default_language_code")]
    pub language_code: String,

    /// Events requested per page when the caller does not specify a count.
    #[serde(default = "default_event_count")]
    pub default_event_count: usize,

    // === HTTP Tuning ===
    /// Default request timeout in milliseconds.
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,

    /// Timeout for subscribe requests in milliseconds.
    #[serde(default = "default_subscribe_timeout_ms")]
    pub subscribe_timeout_ms: u64,

    // === Push Channel ===
    /// Push websocket URL.
    #[serde(default = "default_ws_url")]
    pub push_ws_url: String,

    /// Maximum reconnect backoff in seconds.
    #[serde(default = "default_reconnect_max_delay")]
    pub ws_reconnect_max_delay_s: u64,

    /// Heartbeat interval in seconds.
    #[serde(default = "default_heartbeat_interval")]
    pub ws_heartbeat_interval_s: u64,

    // === Server Configuration ===
    /// HTTP server port for health/status endpoints.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Whether to expose Prometheus metrics.
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    /// Prometheus exporter port.
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Enable verbose logging.
    #[serde(default)]
    pub verbose: bool,
}

fn default_subscribe_url() -> String {
    "https://localhost/".to_string()
}

fn default_language_code() -> String {
    "fr".to_string()
}

fn default_event_count() -> usize {
    20
}

fn default_http_timeout_ms() -> u64 {
    20_000
}

fn default_subscribe_timeout_ms() -> u64 {
    10_000
}

fn default_ws_url() -> String {
    "wss://localhost/push".to_string()
}

fn default_reconnect_max_delay() -> u64 {
    30
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            subscribe_url: default_subscribe_url(),
            language_code: default_language_code(),
            default_event_count: default_event_count(),
            http_timeout_ms: default_http_timeout_ms(),
            subscribe_timeout_ms: default_subscribe_timeout_ms(),
            push_ws_url: default_ws_url(),
            ws_reconnect_max_delay_s: default_reconnect_max_delay(),
            ws_heartbeat_interval_s: default_heartbeat_interval(),
            port: default_port(),
            metrics_enabled: default_true(),
            metrics_port: default_metrics_port(),
            rust_log: default_log_level(),
            verbose: false,
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        let subscribe = Url::parse(&self.subscribe_url)
            .map_err(|e| format!("SUBSCRIBE_URL is not a valid URL: {e}"))?;
        if !matches!(subscribe.scheme(), "http" | "https") {
            return Err("SUBSCRIBE_URL must use http or https".to_string());
        }

        let push = Url::parse(&self.push_ws_url)
            .map_err(|e| format!("PUSH_WS_URL is not a valid URL: {e}"))?;
        if !matches!(push.scheme(), "ws" | "wss") {
            return Err("PUSH_WS_URL must use ws or wss".to_string());
        }

        if self.default_event_count == 0 {
            return Err("DEFAULT_EVENT_COUNT must be at least 1".to_string());
        }

        if self.language_code.is_empty() {
            return Err("LANGUAGE_CODE is required".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values_are_sensible() {
        let config = Config::default();
        assert_eq!(config.default_event_count, 20);
        assert_eq!(config.subscribe_timeout_ms, 10_000);
        assert_eq!(config.language_code, "fr");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_http_push_url() {
        let config = Config {
            push_ws_url: "https://push.example.com".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_unparsable_subscribe_url() {
        let config = Config {
            subscribe_url: "not a url".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_event_count() {
        let config = Config {
            default_event_count: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
