//! TLS strategy selection.
//!
//! Exactly one strategy is chosen per boot:
//! - **Automatic**: ACME-issued certificates for a single hostname
//! - **Manual**: certificate and key files from the configuration
//! - **None**: plain HTTP
//!
//! Automatic TLS requested without a hostname falls back to `None` (never
//! `Manual`) and the fallback is logged before the listener starts.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::SslConfig;

/// How the primary listener secures its transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsStrategy {
    Manual { cert_file: PathBuf, key_file: PathBuf },
    Automatic { hostname: String, cache_dir: PathBuf },
    None,
}

impl TlsStrategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            TlsStrategy::Manual { .. } => StrategyKind::Manual,
            TlsStrategy::Automatic { .. } => StrategyKind::Automatic,
            TlsStrategy::None => StrategyKind::None,
        }
    }

    pub fn hostname(&self) -> Option<&str> {
        match self {
            TlsStrategy::Automatic { hostname, .. } => Some(hostname),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Manual,
    Automatic,
    None,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StrategyKind::Manual => "manual",
            StrategyKind::Automatic => "automatic",
            StrategyKind::None => "none",
        })
    }
}

/// Automatic TLS as requested on the command line
#[derive(Debug, Clone, Default)]
pub struct AutoTlsRequest {
    pub enabled: bool,
    pub hostname: String,
}

impl AutoTlsRequest {
    pub fn new(enabled: bool, hostname: impl Into<String>) -> Self {
        Self {
            enabled,
            hostname: hostname.into(),
        }
    }
}

/// Choose the TLS strategy for this boot.
///
/// `cache_dir` is where ACME state is kept when the strategy is Automatic.
/// `address` is only used to make the decision reconstructible from the logs.
pub fn select_strategy(
    request: &AutoTlsRequest,
    ssl: &SslConfig,
    cache_dir: &Path,
    address: &str,
) -> TlsStrategy {
    let auto_tls = request.enabled && !request.hostname.is_empty();

    let strategy = if request.enabled && request.hostname.is_empty() {
        tracing::warn!(
            auto_tls = true,
            "automatic TLS requested without a hostname; falling back to plain HTTP"
        );
        TlsStrategy::None
    } else if auto_tls {
        TlsStrategy::Automatic {
            hostname: request.hostname.clone(),
            cache_dir: cache_dir.to_path_buf(),
        }
    } else if ssl.enabled {
        TlsStrategy::Manual {
            cert_file: ssl.certificate_file.clone(),
            key_file: ssl.key_file.clone(),
        }
    } else {
        TlsStrategy::None
    };

    tracing::info!(
        strategy = %strategy.kind(),
        use_ssl = ssl.enabled,
        use_auto_tls = auto_tls,
        tls_hostname = strategy.hostname().unwrap_or(""),
        host_address = %address,
        "configuring internal webserver"
    );

    strategy
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Collects formatted log output for assertions.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn select_logged(request: &AutoTlsRequest, ssl: &SslConfig) -> (TlsStrategy, String) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let strategy = tracing::subscriber::with_default(subscriber, || {
            select_strategy(
                request,
                ssl,
                Path::new("/var/lib/ddu/.tls-cache"),
                "0.0.0.0:8080",
            )
        });
        (strategy, logs.contents())
    }

    fn manual_ssl(enabled: bool) -> SslConfig {
        SslConfig {
            enabled,
            certificate_file: PathBuf::from("/etc/ssl/ddu.pem"),
            key_file: PathBuf::from("/etc/ssl/ddu.key"),
        }
    }

    #[test]
    fn test_auto_tls_without_hostname_falls_back_to_none() {
        for enabled in [false, true] {
            let (strategy, logs) =
                select_logged(&AutoTlsRequest::new(true, ""), &manual_ssl(enabled));
            assert_eq!(strategy, TlsStrategy::None, "ssl.enabled = {enabled}");
            assert!(logs.contains("WARN"), "expected a warning, got: {logs}");
            assert!(logs.contains("falling back to plain HTTP"));
            assert!(logs.contains("strategy=none"));
            assert!(logs.contains("use_auto_tls=false"));
        }
    }

    #[test]
    fn test_auto_tls_with_hostname_wins_over_manual() {
        for enabled in [false, true] {
            let (strategy, logs) =
                select_logged(&AutoTlsRequest::new(true, "example.com"), &manual_ssl(enabled));
            assert_eq!(
                strategy,
                TlsStrategy::Automatic {
                    hostname: "example.com".to_string(),
                    cache_dir: PathBuf::from("/var/lib/ddu/.tls-cache"),
                }
            );
            assert!(!logs.contains("WARN"));
            assert!(logs.contains("strategy=automatic"));
            assert!(logs.contains("tls_hostname=\"example.com\""));
        }
    }

    #[test]
    fn test_manual_when_ssl_enabled() {
        let (strategy, logs) = select_logged(&AutoTlsRequest::default(), &manual_ssl(true));
        assert_eq!(
            strategy,
            TlsStrategy::Manual {
                cert_file: PathBuf::from("/etc/ssl/ddu.pem"),
                key_file: PathBuf::from("/etc/ssl/ddu.key"),
            }
        );
        assert!(logs.contains("host_address=0.0.0.0:8080"));
    }

    #[test]
    fn test_none_when_nothing_requested() {
        let (strategy, _) =
            select_logged(&AutoTlsRequest::new(false, "example.com"), &manual_ssl(false));
        assert_eq!(strategy, TlsStrategy::None);
        assert_eq!(strategy.kind().to_string(), "none");
        assert_eq!(strategy.hostname(), None);
    }
}
