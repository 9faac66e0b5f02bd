//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section, and every field carries a serde default so that an empty
//! configuration still yields a runnable development setup.

pub mod app;
pub mod auth;
pub mod database;
pub mod logging;
pub mod storage;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use self::app::{CorsConfig, ServerConfig};
pub use self::auth::AuthConfig;
pub use self::database::DatabaseConfig;
pub use self::logging::LoggingConfig;
pub use self::storage::{LocalStorageConfig, S3StorageConfig, StorageConfig};
pub use self::worker::WorkerConfig;

use crate::error::AppError;

/// Prefix for environment variable overrides (`CLOUDBOX_SERVER__PORT=9000`).
pub const ENV_PREFIX: &str = "CLOUDBOX";

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Token verification settings.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Storage backend, upload limits, and quota settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Background worker settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges `config/default.toml`, an environment-specific overlay
    /// `config/{env}.toml`, and environment variables prefixed with
    /// `CLOUDBOX_`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let loaded: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject combinations that cannot run.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.storage.signed_url_ttl_seconds == 0 {
            return Err(AppError::configuration(
                "storage.signed_url_ttl_seconds must be greater than zero",
            ));
        }
        if self.storage.max_file_size_bytes == 0 {
            return Err(AppError::configuration(
                "storage.max_file_size_bytes must be greater than zero",
            ));
        }
        if self.storage.backend == "s3" && self.storage.s3.bucket.is_empty() {
            return Err(AppError::configuration(
                "storage.s3.bucket is required when storage.backend = \"s3\"",
            ));
        }
        if self.database.provider == "postgres" && self.database.url.is_empty() {
            return Err(AppError::configuration(
                "database.url is required when database.provider = \"postgres\"",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_limits() {
        let config = AppConfig::default();
        assert_eq!(config.storage.max_file_size_bytes, 50 * 1024 * 1024 * 1024);
        assert_eq!(config.storage.signed_url_ttl_seconds, 600);
        assert_eq!(config.storage.backend, "local");
        assert_eq!(config.worker.pending_upload_ttl_seconds, 3600);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_validate_requires_bucket_for_s3() {
        let mut config = AppConfig::default();
        config.database.provider = "memory".to_string();
        config.storage.backend = "s3".to_string();
        assert!(config.validate().is_err());

        config.storage.s3.bucket = "cloudbox-objects".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_partial_toml() {
        let raw = r#"
            [server]
            port = 9000

            [storage]
            backend = "s3"

            [storage.s3]
            bucket = "objects"
        "#;
        let parsed: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .and_then(|c| c.try_deserialize())
            .unwrap();

        assert_eq!(parsed.server.port, 9000);
        assert_eq!(parsed.server.host, "0.0.0.0");
        assert_eq!(parsed.storage.s3.bucket, "objects");
        assert_eq!(parsed.storage.s3.region, "us-east-1");
        assert_eq!(parsed.logging.format, "json");
    }
}
