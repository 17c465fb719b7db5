use std::result::Result as StdResult;
use thiserror::Error;
use reqwest;
use serde_json;
use anyhow;
use prometheus;
use std::io;

#[derive(Debug, Error)]
pub enum Error {
    #[error("API error: {0}")]
    ApiError(String),
    #[error("API invalid data: {0}")]
    ApiInvalidData(String),
    #[error("API invalid format: {0}")]
    ApiInvalidFormat(String),
    #[error("API connection failed: {0}")]
    ApiConnectionFailed(String),
    #[error("API authentication failed: {0}")]
    ApiAuthFailed(String),
    #[error("API quota exceeded: {0}")]
    ApiQuotaExceeded(String),
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Transform error: {0}")]
    TransformError(String),
    #[error("Schedule error: {0}")]
    ScheduleError(String),
    #[error("Internal error: {0}")]
    InternalError(String),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl Error {
    /// Short machine-friendly name of the variant, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::ApiError(_) => "api",
            Error::ApiInvalidData(_) => "api_invalid_data",
            Error::ApiInvalidFormat(_) => "api_invalid_format",
            Error::ApiConnectionFailed(_) => "api_connection",
            Error::ApiAuthFailed(_) => "api_auth",
            Error::ApiQuotaExceeded(_) => "api_quota",
            Error::RateLimitExceeded(_) => "rate_limit",
            Error::ValidationError(_) => "validation",
            Error::DatabaseError(_) => "database",
            Error::ConfigError(_) => "config",
            Error::TransformError(_) => "transform",
            Error::ScheduleError(_) => "schedule",
            Error::InternalError(_) => "internal",
            Error::IoError(_) => "io",
            Error::HttpError(_) => "http",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ApiInvalidFormat(err.to_string())
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::DatabaseError(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::InternalError(err.to_string())
    }
}

impl From<prometheus::Error> for Error {
    fn from(err: prometheus::Error) -> Self {
        Error::InternalError(err.to_string())
    }
}

pub type Result<T> = StdResult<T, Error>;
