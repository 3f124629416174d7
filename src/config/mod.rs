mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{LoggingSettings, ServerSettings, Settings};

/// Plain environment variable selecting the listen port. Takes precedence
/// over every other source; an empty value counts as unset.
pub const PORT_ENV: &str = "PORT";

/// Loads the configuration from the optional `config/default` file, then
/// `RELAY_`-prefixed environment variables (`RELAY_SERVER__PORT`), then `PORT`.
/// Anything left unspecified falls back to `Settings::default()`.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix("RELAY")
                .prefix_separator("_")
                .separator("__"),
        )
        .set_override_option("server.port", port_from_env())?;

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    let default = Settings::default();
    let server = partial.server;
    let logging = partial.logging;

    Ok(Settings {
        server: ServerSettings {
            host: server
                .as_ref()
                .and_then(|s| s.host.clone())
                .unwrap_or(default.server.host),
            port: server
                .as_ref()
                .and_then(|s| s.port)
                .unwrap_or(default.server.port),
            handshake_timeout_secs: server
                .as_ref()
                .and_then(|s| s.handshake_timeout_secs)
                .unwrap_or(default.server.handshake_timeout_secs),
            idle_timeout_secs: server
                .as_ref()
                .and_then(|s| s.idle_timeout_secs)
                .unwrap_or(default.server.idle_timeout_secs),
            shutdown_grace_ms: server
                .as_ref()
                .and_then(|s| s.shutdown_grace_ms)
                .unwrap_or(default.server.shutdown_grace_ms),
        },
        logging: LoggingSettings {
            level: logging
                .and_then(|l| l.level)
                .unwrap_or(default.logging.level),
        },
    })
}

fn port_from_env() -> Option<String> {
    std::env::var(PORT_ENV)
        .ok()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
}
