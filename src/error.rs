//! Top-level boot error.
//!
//! Only configuration-load, logging and listener failures are fatal. Every
//! other subsystem logs and degrades instead of returning here.

use crate::config::ConfigError;
use crate::http::ServerError;
use crate::logging::LoggingError;

#[derive(Debug, thiserror::Error)]
pub enum BootError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error("Failed to build outbound HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("Listener task aborted: {0}")]
    ListenerAborted(String),
}
