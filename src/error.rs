//! Custom error types for harvest

use thiserror::Error;

/// Main error type for harvest operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Robots.txt disallowed: {0}")]
    PolicyDenied(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Unsupported payload shape: {0}")]
    UnsupportedShape(String),

    #[error("Empty response from {0}")]
    EmptyResponse(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Stable label for logs and per-source error maps
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::PolicyDenied(_) => "policy_denied",
            Error::Upstream(_) => "upstream",
            Error::MalformedResponse(_) => "malformed_response",
            Error::UnsupportedShape(_) => "unsupported_shape",
            Error::EmptyResponse(_) => "empty_response",
            Error::Persistence(_) | Error::Database(_) | Error::Csv(_) => "persistence",
            Error::Io(_) => "io",
            Error::UrlParse(_) => "url_parse",
            Error::Json(_) => "json",
            Error::TomlParse(_) => "toml",
            Error::Other(_) => "other",
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

/// Result type alias for harvest
pub type Result<T> = std::result::Result<T, Error>;
