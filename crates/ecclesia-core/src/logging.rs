//! Structured logging setup
//!
//! Wraps `tracing-subscriber` with three presets. `RUST_LOG` always wins
//! over the configured filter.

use crate::config::{AppConfig, Environment};
use serde_json::{json, Value};
use std::io;
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "warn")
    pub level: String,
    /// Emit JSON lines instead of text
    pub json_format: bool,
    /// Multi-line pretty output for development
    pub pretty_print: bool,
    /// Include file and line number information
    pub include_location: bool,
    /// Fields attached to the startup event
    pub global_fields: serde_json::Map<String, Value>,
    /// Filter directives such as "ecclesia_http=debug,tower_http=info"
    pub env_filter: Option<String>,
    pub service_name: Option<String>,
    pub service_version: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            pretty_print: true,
            include_location: false,
            global_fields: serde_json::Map::new(),
            env_filter: None,
            service_name: None,
            service_version: None,
        }
    }
}

impl LoggingConfig {
    /// JSON output at info level
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            json_format: true,
            pretty_print: false,
            include_location: false,
            global_fields: env_field("production"),
            env_filter: Some("ecclesia=info,tower_http=warn,sqlx=warn".to_string()),
            service_name: None,
            service_version: None,
        }
    }

    /// Pretty output at debug level
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            json_format: false,
            pretty_print: true,
            include_location: true,
            global_fields: env_field("development"),
            env_filter: Some("ecclesia=debug,tower_http=debug,sqlx=info".to_string()),
            service_name: None,
            service_version: None,
        }
    }

    /// Errors only
    pub fn test() -> Self {
        Self {
            level: "error".to_string(),
            json_format: false,
            pretty_print: false,
            include_location: false,
            global_fields: env_field("test"),
            env_filter: Some("ecclesia=error".to_string()),
            service_name: None,
            service_version: None,
        }
    }

    /// Pick a preset for the environment and apply the configured level
    pub fn from_app_config(config: &AppConfig) -> Self {
        let mut logging = match config.environment {
            Environment::Production => Self::production(),
            Environment::Development => Self::development(),
            Environment::Testing => Self::test(),
        };
        logging.level = config.log_level.clone();
        logging.json_format = config.log_json;
        if config.log_json {
            logging.pretty_print = false;
        }
        logging
    }

    pub fn with_global_field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.global_fields.insert(key.into(), value.into());
        self
    }

    pub fn with_service(mut self, name: &str, version: &str) -> Self {
        self.service_name = Some(name.to_string());
        self.service_version = Some(version.to_string());
        self
    }

    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Filter directives used when `RUST_LOG` is unset
    pub fn filter_directives(&self) -> String {
        match &self.env_filter {
            // The configured level applies to everything not named explicitly
            Some(filter) => format!("{},{}", self.level, filter),
            None => self.level.clone(),
        }
    }
}

fn env_field(env: &str) -> serde_json::Map<String, Value> {
    let mut fields = serde_json::Map::new();
    fields.insert("env".to_string(), json!(env));
    fields
}

/// Initialize the global subscriber
pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.filter_directives()))?;

    if config.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                Layer::new()
                    .with_writer(io::stdout)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .json(),
            )
            .try_init()?;
    } else if config.pretty_print {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                Layer::new()
                    .with_writer(io::stdout)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .pretty(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_writer(io::stdout))
            .try_init()?;
    }

    let mut init_msg = json!({
        "message": "Structured logging initialized",
        "level": config.level,
        "json_format": config.json_format,
    });
    if let Some(name) = config.service_name {
        init_msg["service_name"] = json!(name);
    }
    if let Some(version) = config.service_version {
        init_msg["service_version"] = json!(version);
    }
    for (key, value) in config.global_fields {
        init_msg[key] = value;
    }
    tracing::info!(target: "ecclesia::logging", "{}", init_msg);

    Ok(())
}

/// Log application startup with system information
pub fn log_startup_info(service_name: &str, service_version: &str) {
    tracing::info!(
        target: "ecclesia::startup",
        event = "application_startup",
        service = service_name,
        version = service_version,
        pid = std::process::id(),
        os = std::env::consts::OS,
        arch = std::env::consts::ARCH,
        "Starting {} v{}",
        service_name,
        service_version
    );
}

/// Log application shutdown
pub fn log_shutdown_info(service_name: &str) {
    tracing::info!(
        target: "ecclesia::shutdown",
        event = "application_shutdown",
        service = service_name,
        "Shutting down {}",
        service_name
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let prod = LoggingConfig::production();
        assert!(prod.json_format);
        assert!(!prod.pretty_print);
        assert_eq!(prod.global_fields.get("env"), Some(&json!("production")));

        let dev = LoggingConfig::development();
        assert_eq!(dev.level, "debug");
        assert!(dev.include_location);

        let test = LoggingConfig::test();
        assert_eq!(test.level, "error");
    }

    #[test]
    fn test_from_app_config_applies_overrides() {
        let mut app = AppConfig::for_testing();
        app.log_level = "warn".to_string();
        app.log_json = true;

        let logging = LoggingConfig::from_app_config(&app);
        assert_eq!(logging.level, "warn");
        assert!(logging.json_format);
        assert!(!logging.pretty_print);
    }

    #[test]
    fn test_filter_directives() {
        let config = LoggingConfig::default().with_env_filter("ecclesia_http=trace");
        assert_eq!(config.filter_directives(), "info,ecclesia_http=trace");
        assert_eq!(LoggingConfig::default().filter_directives(), "info");
    }

    #[test]
    fn test_builder_methods() {
        let config = LoggingConfig::default()
            .with_service("ecclesia-api", "0.1.0")
            .with_global_field("region", "eu");
        assert_eq!(config.service_name.as_deref(), Some("ecclesia-api"));
        assert_eq!(config.global_fields.get("region"), Some(&json!("eu")));
    }

    #[tracing_test::traced_test]
    #[test]
    fn test_startup_info_is_logged() {
        log_startup_info("ecclesia-api", "0.1.0");
        assert!(logs_contain("Starting ecclesia-api v0.1.0"));
    }
}
