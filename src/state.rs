//! Shared application state for request handlers.

use std::sync::Arc;
use std::time::Duration;

use const_format::formatcp;

use crate::config::AppConfig;

/// User agent sent on outbound API calls
pub const USER_AGENT: &str = formatcp!("sleepydrive/{}", env!("CARGO_PKG_VERSION"));

/// Timeout for outbound API calls
const OUTBOUND_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared application state, cloneable across handlers via Arc-wrapped fields.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// Client for outbound API calls
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, http: reqwest::Client) -> Self {
        Self { config, http }
    }
}

/// Build the outbound HTTP client.
///
/// With `ignore_certificate_errors` the client accepts any certificate chain
/// and host name.
pub fn build_http_client(
    ignore_certificate_errors: bool,
) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(OUTBOUND_TIMEOUT)
        .danger_accept_invalid_certs(ignore_certificate_errors)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_carries_version() {
        assert!(USER_AGENT.starts_with("sleepydrive/"));
        assert!(USER_AGENT.ends_with(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_client_builds_in_both_modes() {
        assert!(build_http_client(false).is_ok());
        assert!(build_http_client(true).is_ok());
    }
}
