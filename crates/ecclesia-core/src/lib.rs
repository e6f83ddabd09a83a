//! # ecclesia-core
//!
//! Foundation shared by every Ecclesia crate: environment-driven
//! configuration, the application error type returned by services,
//! structured logging setup and a few small helpers for ids and dates.

pub mod config;
pub mod error;
pub mod logging;
pub mod time;
pub mod util;

pub use config::{
    AppConfig, AppConfigTrait, AuthConfig, ConfigError, ConfigSource, DatabaseConfig, Environment,
    ServerConfig,
};
pub use error::{AppError, AppResult, FieldError};
pub use logging::{init_logging, LoggingConfig};
pub use util::{new_id, slugify};
