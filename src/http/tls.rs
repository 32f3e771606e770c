//! TLS settings handed to the primary listener.
//!
//! The listener starts from a default TLS configuration. The selected
//! strategy then attaches its certificate source once, or clears the
//! configuration entirely for plain HTTP. Nothing mutates it after that.

use std::net::SocketAddr;
use std::path::PathBuf;

use super::strategy::TlsStrategy;

/// ALPN protocol id for HTTP/2
pub const ALPN_H2: &[u8] = b"h2";

/// ALPN protocol id for HTTP/1.1
pub const ALPN_HTTP11: &[u8] = b"http/1.1";

/// ALPN protocol id used by the TLS-ALPN-01 ACME challenge (RFC 8737)
pub const ALPN_ACME_TLS: &[u8] = b"acme-tls/1";

/// Install aws-lc-rs as the process-wide rustls provider.
///
/// Both aws-lc-rs and ring are linked, so rustls cannot pick one on its own.
/// Returns false when a provider was already installed.
pub fn install_crypto_provider() -> bool {
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_ok()
}

/// Where handshake certificates come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateSource {
    /// Nothing attached yet
    Unset,
    /// Static PEM certificate chain and key
    Files { cert_file: PathBuf, key_file: PathBuf },
    /// Resolved per handshake by the ACME client, restricted to `hostname`
    Acme { hostname: String, cache_dir: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsSettings {
    pub alpn_protocols: Vec<Vec<u8>>,
    pub certificates: CertificateSource,
}

impl Default for TlsSettings {
    fn default() -> Self {
        Self {
            alpn_protocols: vec![ALPN_H2.to_vec(), ALPN_HTTP11.to_vec()],
            certificates: CertificateSource::Unset,
        }
    }
}

impl TlsSettings {
    /// True when certificates are picked per handshake instead of loaded once
    pub fn has_certificate_callback(&self) -> bool {
        matches!(self.certificates, CertificateSource::Acme { .. })
    }

    pub fn advertises(&self, protocol: &[u8]) -> bool {
        self.alpn_protocols.iter().any(|p| p == protocol)
    }
}

/// Address and transport security of the primary listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConfig {
    pub addr: SocketAddr,
    pub tls: Option<TlsSettings>,
}

impl ListenerConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            tls: Some(TlsSettings::default()),
        }
    }

    /// Build the listener configuration for a strategy.
    pub fn for_strategy(addr: SocketAddr, strategy: &TlsStrategy) -> Self {
        let mut config = Self::new(addr);
        config.apply_strategy(strategy);
        config
    }

    /// Attach the strategy-specific TLS fields.
    pub fn apply_strategy(&mut self, strategy: &TlsStrategy) {
        match strategy {
            TlsStrategy::Automatic { hostname, cache_dir } => {
                let tls = self.tls.get_or_insert_with(TlsSettings::default);
                tls.certificates = CertificateSource::Acme {
                    hostname: hostname.clone(),
                    cache_dir: cache_dir.clone(),
                };
                if !tls.advertises(ALPN_ACME_TLS) {
                    tls.alpn_protocols.push(ALPN_ACME_TLS.to_vec());
                }
            }
            TlsStrategy::Manual { cert_file, key_file } => {
                let tls = self.tls.get_or_insert_with(TlsSettings::default);
                tls.certificates = CertificateSource::Files {
                    cert_file: cert_file.clone(),
                    key_file: key_file.clone(),
                };
            }
            TlsStrategy::None => {
                self.tls = None;
            }
        }
    }
}
