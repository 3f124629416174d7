use serde::Deserialize;
use std::time::Duration;

/// Top-level configuration settings for the relay.
///
/// Includes settings for both the network server and logging.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
}

/// Configuration settings for the server.
///
/// Defines the interface and port the listener binds to, plus the
/// timeouts that bound a connection's handshake, its silence, and the
/// shutdown drain.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub handshake_timeout_secs: u64,
    /// A client that sends no frame (not even a pong) for this long is
    /// dropped. Pings go out at half this interval. `0` disables both.
    pub idle_timeout_secs: u64,
    pub shutdown_grace_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Missing values are filled in from `Settings::default()`.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub handshake_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
    pub shutdown_grace_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "0.0.0.0".to_string(),
                port: 3000,
                handshake_timeout_secs: 10,
                idle_timeout_secs: 120,
                shutdown_grace_ms: 500,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl ServerSettings {
    /// The `host:port` string the listener binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    /// `None` when idle detection is disabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}
