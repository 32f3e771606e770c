//! Primary listener.
//!
//! Binds the API with the TLS settings prepared for the selected strategy and
//! serves until shutdown:
//! - ACME: certificates resolved per handshake, challenge responder on port 80
//! - Manual: certificate and key loaded from PEM files
//! - Plain: no TLS
//!
//! Every bind/serve failure is fatal for the caller. There is no way back to
//! `Configuring`; a different strategy needs a process restart.

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use futures::StreamExt;
use rustls_acme::caches::DirCache;
use rustls_acme::AcmeConfig;
use tokio::sync::watch;

use crate::config::ACME_HTTP_PORT;

use super::challenge;
use super::tls::{CertificateSource, ListenerConfig, TlsSettings};

/// Server startup error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid listen address '{0}'")]
    Address(String),

    #[error("Failed to load TLS configuration: {0}")]
    TlsConfig(String),

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Lifecycle of the primary listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Configuring,
    ServingAutomaticTls(SocketAddr),
    ServingManualTls(SocketAddr),
    ServingPlain(SocketAddr),
    Terminated,
}

impl ListenerState {
    pub fn is_serving(&self) -> bool {
        self.local_addr().is_some()
    }

    /// Bound address while serving
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            ListenerState::ServingAutomaticTls(addr)
            | ListenerState::ServingManualTls(addr)
            | ListenerState::ServingPlain(addr) => Some(*addr),
            ListenerState::Configuring | ListenerState::Terminated => None,
        }
    }
}

/// Parse `host:port` from the configuration.
pub fn parse_listen_address(host: &str, port: u16) -> Result<SocketAddr, ServerError> {
    let raw = format!("{host}:{port}");
    raw.parse().map_err(|_| ServerError::Address(raw))
}

pub struct Listener {
    config: ListenerConfig,
    handle: Handle,
    state: watch::Sender<ListenerState>,
}

impl Listener {
    pub fn new(config: ListenerConfig) -> Self {
        let (state, _) = watch::channel(ListenerState::Configuring);
        Self {
            config,
            handle: Handle::new(),
            state,
        }
    }

    /// Handle used to trigger a graceful shutdown
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ListenerState> {
        self.state.subscribe()
    }

    /// Bind and serve `app`. Blocks until the server shuts down or fails.
    pub async fn run(self, app: Router) -> Result<(), ServerError> {
        let result = match self.config.tls.clone() {
            None => self.serve_plain(app).await,
            Some(tls) => match tls.certificates.clone() {
                CertificateSource::Files { cert_file, key_file } => {
                    self.serve_manual(app, &tls, &cert_file, &key_file).await
                }
                CertificateSource::Acme { hostname, cache_dir } => {
                    self.serve_acme(app, &tls, &hostname, &cache_dir).await
                }
                CertificateSource::Unset => Err(ServerError::TlsConfig(
                    "TLS enabled without a certificate source".to_string(),
                )),
            },
        };

        self.state.send_replace(ListenerState::Terminated);
        result
    }

    /// Drive `server` and flip the state once the socket is bound.
    ///
    /// The server future is raced against the bind notification: a failed bind
    /// completes `server` and may never wake `listening()`.
    async fn serve_until_done<F>(
        &self,
        serving: fn(SocketAddr) -> ListenerState,
        server: F,
    ) -> Result<(), ServerError>
    where
        F: Future<Output = std::io::Result<()>>,
    {
        tokio::pin!(server);

        let bound = tokio::select! {
            result = &mut server => return result.map_err(ServerError::from),
            bound = self.handle.listening() => bound,
        };
        if let Some(bound) = bound {
            self.state.send_replace(serving(bound));
            tracing::info!(addr = %bound, "webserver is now listening");
        }

        server.await.map_err(ServerError::from)
    }

    async fn serve_plain(&self, app: Router) -> Result<(), ServerError> {
        let addr = self.config.addr;
        tracing::info!(%addr, "Starting HTTP server (no TLS)");

        let server = axum_server::bind(addr)
            .handle(self.handle.clone())
            .serve(app.into_make_service());

        self.serve_until_done(ListenerState::ServingPlain, server)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "failed to configure HTTP server"))
    }

    async fn serve_manual(
        &self,
        app: Router,
        tls: &TlsSettings,
        cert_file: &Path,
        key_file: &Path,
    ) -> Result<(), ServerError> {
        let addr = self.config.addr;
        tracing::info!(
            %addr,
            cert = %cert_file.display(),
            key = %key_file.display(),
            "Starting HTTPS server (manual certs)"
        );

        let result = async {
            let loaded = RustlsConfig::from_pem_file(cert_file, key_file)
                .await
                .map_err(|e| ServerError::TlsConfig(format!("Failed to load certificates: {e}")))?;
            let mut server_config = (*loaded.get_inner()).clone();
            server_config.alpn_protocols = tls.alpn_protocols.clone();
            let rustls_config = RustlsConfig::from_config(Arc::new(server_config));

            let server = axum_server::bind_rustls(addr, rustls_config)
                .handle(self.handle.clone())
                .serve(app.into_make_service());
            self.serve_until_done(ListenerState::ServingManualTls, server)
                .await
        }
        .await;

        result.inspect_err(|e| {
            tracing::error!(auto_tls = false, error = %e, "failed to configure HTTPS server")
        })
    }

    async fn serve_acme(
        &self,
        app: Router,
        tls: &TlsSettings,
        hostname: &str,
        cache_dir: &Path,
    ) -> Result<(), ServerError> {
        let addr = self.config.addr;
        tracing::info!(
            %addr,
            hostname = %hostname,
            cache = %cache_dir.display(),
            "starting webserver with auto-TLS enabled; \
             certificates will be generated by Let's Encrypt"
        );

        let result = async {
            std::fs::create_dir_all(cache_dir).map_err(|e| {
                ServerError::TlsConfig(format!(
                    "Failed to create ACME cache directory '{}': {}",
                    cache_dir.display(),
                    e
                ))
            })?;

            // Only the configured hostname is ever requested from the CA.
            let mut acme_state = AcmeConfig::new([hostname])
                .cache(DirCache::new(cache_dir.to_path_buf()))
                .directory_lets_encrypt(true)
                .state();

            let mut server_config = rustls::ServerConfig::builder()
                .with_no_client_auth()
                .with_cert_resolver(acme_state.resolver());
            server_config.alpn_protocols = tls.alpn_protocols.clone();
            let acceptor = acme_state.axum_acceptor(Arc::new(server_config));

            // Drives certificate ordering and renewal.
            tokio::spawn(async move {
                loop {
                    match acme_state.next().await {
                        Some(Ok(event)) => {
                            tracing::info!(event = ?event, "ACME event");
                        }
                        Some(Err(err)) => {
                            tracing::error!(error = %err, "ACME error");
                        }
                        None => {
                            tracing::debug!("ACME state stream ended");
                            break;
                        }
                    }
                }
            });

            challenge::spawn_challenge_responder(ACME_HTTP_PORT, addr.port());

            let server = axum_server::bind(addr)
                .handle(self.handle.clone())
                .acceptor(acceptor)
                .serve(app.into_make_service());
            self.serve_until_done(ListenerState::ServingAutomaticTls, server)
                .await
        }
        .await;

        result.inspect_err(|e| {
            tracing::error!(
                auto_tls = true,
                tls_hostname = %hostname,
                error = %e,
                "failed to configure HTTP server using auto-tls"
            )
        })
    }
}
