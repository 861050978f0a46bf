//! API configuration module.
//!
//! Configuration is loaded from environment variables with fallback to
//! defaults. `main` calls `dotenvy::dotenv()` first, so a local `.env` file
//! works too.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Cloudinary account credentials.
#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// HTTP port
    pub port: u16,

    /// Interface to bind
    pub bind_address: String,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Pool size
    pub db_max_connections: u32,

    /// Secret for signing access tokens
    pub access_token_secret: String,

    /// Access token lifetime in seconds
    pub access_token_expiry_secs: i64,

    /// Secret for signing refresh tokens
    pub refresh_token_secret: String,

    /// Refresh token lifetime in seconds
    pub refresh_token_expiry_secs: i64,

    /// Allowed CORS origin; `None` allows any origin
    pub cors_origin: Option<String>,

    /// Where multipart uploads are staged before going to Cloudinary
    pub upload_dir: PathBuf,

    /// Max request body size in bytes (default: 100MB)
    pub body_limit_bytes: usize,

    /// `None` when any of the three Cloudinary variables is missing
    pub cloudinary: Option<CloudinaryConfig>,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let config = ApiConfig {
            port: parse_var("PORT", "8000")?,

            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string()),

            database_path: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "vidtube.db".to_string())
                .into(),

            db_max_connections: parse_var("DB_MAX_CONNECTIONS", "5")?,

            access_token_secret: required_var("ACCESS_TOKEN_SECRET")?,

            access_token_expiry_secs: parse_var("ACCESS_TOKEN_EXPIRY_SECS", "86400")?, // 1 day

            refresh_token_secret: required_var("REFRESH_TOKEN_SECRET")?,

            refresh_token_expiry_secs: parse_var("REFRESH_TOKEN_EXPIRY_SECS", "864000")?, // 10 days

            cors_origin: env::var("CORS_ORIGIN").ok().filter(|v| !v.is_empty()),

            upload_dir: env::var("UPLOAD_DIR")
                .unwrap_or_else(|_| "./public/temp".to_string())
                .into(),

            body_limit_bytes: parse_var("BODY_LIMIT_BYTES", "104857600")?,

            cloudinary: match (
                env::var("CLOUDINARY_CLOUD_NAME"),
                env::var("CLOUDINARY_API_KEY"),
                env::var("CLOUDINARY_API_SECRET"),
            ) {
                (Ok(cloud_name), Ok(api_key), Ok(api_secret)) => Some(CloudinaryConfig {
                    cloud_name,
                    api_key,
                    api_secret,
                }),
                _ => None,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.access_token_expiry_secs <= 0 {
            return Err(ConfigError::InvalidValue("ACCESS_TOKEN_EXPIRY_SECS".to_string()));
        }
        if self.refresh_token_expiry_secs <= 0 {
            return Err(ConfigError::InvalidValue("REFRESH_TOKEN_EXPIRY_SECS".to_string()));
        }
        if self.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }
        Ok(())
    }

    /// `bind_address:port`
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

fn parse_var<T: FromStr>(name: &str, default: &str) -> Result<T, ConfigError> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name.to_string()))
}

fn required_var(name: &str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingRequired(name.to_string()))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
